//! Simulation configuration documents.
//!
//! A document has four sections, `meta`, `initial`, `parameters` and
//! `interventions`. [`RawConfig`] keeps the document exactly as written,
//! string expressions included, because resolution depends on section and
//! key order. [`ResolvedConfig`] is the fully numeric result produced by the
//! [`crate::resolver`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error;
use tracing::warn;

use crate::eval::Value;

pub const META: &str = "meta";
pub const INITIAL: &str = "initial";
pub const PARAMETERS: &str = "parameters";
pub const INTERVENTIONS: &str = "interventions";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration document: {0}")]
    InvalidDocument(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Unresolved configuration document in its written order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawConfig {
    document: serde_yaml::Mapping,
}

impl RawConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_str(source: &str) -> ConfigResult<Self> {
        match serde_yaml::from_str::<serde_yaml::Value>(source)? {
            serde_yaml::Value::Null => Ok(Self::default()),
            serde_yaml::Value::Mapping(document) => Ok(Self { document }),
            other => Err(ConfigError::InvalidDocument(format!(
                "top level must be a mapping, found {:?}",
                other
            ))),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&source)
    }

    pub fn document(&self) -> &serde_yaml::Mapping {
        &self.document
    }

    /// Returns the named section as a mapping, creating it at the end of the
    /// document when absent.
    pub fn section_mut(&mut self, name: &str) -> ConfigResult<&mut serde_yaml::Mapping> {
        let key = serde_yaml::Value::String(name.to_string());
        let section = self
            .document
            .entry(key)
            .or_insert_with(|| serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
        if section.is_null() {
            *section = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
        }
        section
            .as_mapping_mut()
            .ok_or_else(|| ConfigError::InvalidDocument(format!("{} must be a mapping", name)))
    }

    /// Sets `key` in `section`, replacing an existing entry in place so its
    /// position in the resolution order is kept.
    pub fn set(
        &mut self,
        section: &str,
        key: &str,
        value: impl Into<serde_yaml::Value>,
    ) -> ConfigResult<()> {
        self.section_mut(section)?
            .insert(serde_yaml::Value::String(key.to_string()), value.into());
        Ok(())
    }
}

/// Environment identifiers recorded into every resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub platform: String,
    pub software: String,
    pub revision: String,
    pub runtime: String,
}

impl Provenance {
    pub fn current() -> Self {
        Self {
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            software: format!("ptti {}", env!("CARGO_PKG_VERSION")),
            revision: option_env!("PTTI_GIT_REVISION")
                .unwrap_or("unknown")
                .to_string(),
            runtime: format!("rust-{}", env!("CARGO_PKG_RUST_VERSION")),
        }
    }
}

/// Run-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_t0")]
    pub t0: f64,

    #[serde(default = "default_tmax")]
    pub tmax: f64,

    #[serde(default = "default_steps")]
    pub steps: usize,

    #[serde(default = "default_samples")]
    pub samples: usize,

    #[serde(default)]
    pub seed: u64,

    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_true")]
    pub rseries: bool,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    /// Keys this crate does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            model: default_model(),
            t0: default_t0(),
            tmax: default_tmax(),
            steps: default_steps(),
            samples: default_samples(),
            seed: 0,
            output: default_output(),
            rseries: default_true(),
            title: default_title(),
            platform: None,
            software: None,
            revision: None,
            runtime: None,
            extra: IndexMap::new(),
        }
    }
}

impl Meta {
    /// Fills absent provenance fields from `provenance` and warns about
    /// recorded values that differ from it.
    pub fn record_provenance(&mut self, provenance: &Provenance) {
        let fields = [
            ("platform", &mut self.platform, &provenance.platform),
            ("software", &mut self.software, &provenance.software),
            ("revision", &mut self.revision, &provenance.revision),
            ("runtime", &mut self.runtime, &provenance.runtime),
        ];
        for (name, field, current) in fields {
            match field {
                Some(recorded) if recorded != current => {
                    warn!("Config {} ({}) differs from {}", name, recorded, current)
                }
                Some(_) => {}
                None => *field = Some(current.clone()),
            }
        }
    }
}

fn default_model() -> String {
    "SEIRCTODEMem".to_string()
}

fn default_t0() -> f64 {
    0.0
}

fn default_tmax() -> f64 {
    365.0
}

fn default_steps() -> usize {
    365
}

fn default_samples() -> usize {
    1
}

fn default_output() -> String {
    "simdata".to_string()
}

fn default_true() -> bool {
    true
}

fn default_title() -> String {
    "PTTI Simulation".to_string()
}

pub const DEFAULT_POPULATION: i64 = 1000;
pub const DEFAULT_INFECTED: i64 = 10;

/// A parameter change applied at `time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub time: f64,

    #[serde(default)]
    pub parameters: IndexMap<String, Value>,

    /// Activation metadata other than `time`, kept verbatim.
    #[serde(flatten)]
    pub metadata: IndexMap<String, serde_yaml::Value>,
}

/// Fully numeric configuration for one sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    #[serde(default)]
    pub meta: Meta,

    #[serde(default)]
    pub initial: IndexMap<String, Value>,

    #[serde(default)]
    pub parameters: IndexMap<String, Value>,

    #[serde(default)]
    pub interventions: Vec<Intervention>,
}

impl ResolvedConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_yaml::from_str(&source)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        save_yaml(self, path)
    }
}

/// Writes any serializable document as YAML.
pub fn save_yaml<T: Serialize, P: AsRef<Path>>(document: &T, path: P) -> ConfigResult<()> {
    let path = path.as_ref();
    let yaml = serde_yaml::to_string(document)?;
    fs::write(path, yaml).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_raw_config_preserves_order() {
        let raw = RawConfig::from_str(
            "parameters:\n  b: a*3\n  a: '2.0'\ninitial:\n  N: 100\nmeta:\n  samples: 2\n",
        )
        .unwrap();

        let sections: Vec<&str> = raw
            .document()
            .keys()
            .filter_map(|k| k.as_str())
            .collect();
        assert_eq!(sections, vec![PARAMETERS, INITIAL, META]);

        let parameters = raw.document()[PARAMETERS].as_mapping().unwrap();
        let keys: Vec<&str> = parameters.keys().filter_map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(RawConfig::from_str("").unwrap(), RawConfig::new());
        assert!(matches!(
            RawConfig::from_str("- 1\n- 2\n"),
            Err(ConfigError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut raw = RawConfig::from_str("parameters:\n  a: 1\n  b: a*2\n").unwrap();
        raw.set(PARAMETERS, "a", 5.0).unwrap();
        raw.set(PARAMETERS, "c", 1.0).unwrap();
        raw.set(INITIAL, "N", 10i64).unwrap();

        let parameters = raw.document()[PARAMETERS].as_mapping().unwrap();
        let keys: Vec<&str> = parameters.keys().filter_map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(parameters["a"].as_f64(), Some(5.0));
        assert_eq!(raw.document()[INITIAL]["N"].as_i64(), Some(10));
    }

    #[test]
    fn test_meta_defaults() {
        let meta: Meta = serde_yaml::from_str("title: custom\nplots: [a, b]\n").unwrap();
        assert_eq!(meta.model, "SEIRCTODEMem");
        assert_eq!(meta.t0, 0.0);
        assert_eq!(meta.tmax, 365.0);
        assert_eq!(meta.steps, 365);
        assert_eq!(meta.samples, 1);
        assert_eq!(meta.seed, 0);
        assert_eq!(meta.output, "simdata");
        assert!(meta.rseries);
        assert_eq!(meta.title, "custom");
        assert!(meta.extra.contains_key("plots"));
    }

    #[test]
    fn test_record_provenance() {
        let provenance = Provenance::current();
        let mut meta = Meta {
            platform: Some("other-os".to_string()),
            ..Meta::default()
        };
        meta.record_provenance(&provenance);

        // mismatches only warn
        assert_eq!(meta.platform.as_deref(), Some("other-os"));
        assert_eq!(meta.software.as_ref(), Some(&provenance.software));
        assert_eq!(meta.revision.as_ref(), Some(&provenance.revision));
        assert_eq!(meta.runtime.as_ref(), Some(&provenance.runtime));
    }

    #[test]
    fn test_resolved_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = ResolvedConfig {
            meta: Meta::default(),
            initial: IndexMap::from([("N".to_string(), Value::Integer(1000))]),
            parameters: IndexMap::from([("beta".to_string(), Value::Float(0.033))]),
            interventions: vec![Intervention {
                time: 60.0,
                parameters: IndexMap::from([("c".to_string(), Value::Integer(5))]),
                metadata: IndexMap::from([(
                    "name".to_string(),
                    serde_yaml::Value::String("lockdown".to_string()),
                )]),
            }],
        };
        config.meta.record_provenance(&Provenance::current());
        config.save(&path).unwrap();

        assert_eq!(ResolvedConfig::load(&path).unwrap(), config);
    }
}
