//! # Configuration Resolver
//!
//! Turns a [`RawConfig`] into a fully numeric [`ResolvedConfig`] for one
//! sample index.
//!
//! Resolution is a single left-to-right pass over the document. Initial
//! conditions and parameters are bound into one [`Namespace`] as they are
//! read, so an entry can reference anything resolved before it, whichever
//! section it came from, and nothing after it. Intervention parameters share
//! the same namespace. There is no dependency graph and no cycle detection:
//! a forward reference is simply an undefined name.

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{
    ConfigError, Intervention, Meta, Provenance, RawConfig, ResolvedConfig, DEFAULT_INFECTED,
    DEFAULT_POPULATION, INITIAL, INTERVENTIONS, META, PARAMETERS,
};
use crate::eval::{EvalError, ExpressionEvaluator, Namespace, Value};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Failed to evaluate {section}.{key}: {source}")]
    Expression {
        section: String,
        key: String,
        #[source]
        source: EvalError,
    },
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Invalid value for {section}.{key}: {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },
    #[error("Invalid configuration document: {0}")]
    InvalidDocument(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Caller-supplied values. Run-level settings are merged into `meta` before
/// resolution; initial conditions and parameters are assigned afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub model: Option<String>,
    pub tmax: Option<f64>,
    pub steps: Option<usize>,
    pub samples: Option<usize>,
    pub output: Option<String>,
    pub population: Option<i64>,
    pub infected: Option<i64>,
    pub vars: Vec<(String, f64)>,
}

impl Overrides {
    /// Parses a `name=value` parameter assignment.
    pub fn parse_var(assignment: &str) -> Result<(String, f64), String> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| format!("expected name=value, got {:?}", assignment))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("missing name in {:?}", assignment));
        }
        let value = value
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid value in {:?}: {}", assignment, e))?;
        Ok((name.to_string(), value))
    }

    /// Writes the run-level settings into `meta`. These are never visible
    /// to expressions, so they can be merged before resolution and checked
    /// with the rest of `meta`.
    pub fn apply_meta(&self, raw: &mut RawConfig) -> ResolveResult<()> {
        if let Some(model) = &self.model {
            raw.set(META, "model", model.as_str())?;
        }
        if let Some(tmax) = self.tmax {
            raw.set(META, "tmax", tmax)?;
        }
        if let Some(steps) = self.steps {
            raw.set(META, "steps", steps as u64)?;
        }
        if let Some(samples) = self.samples {
            raw.set(META, "samples", samples as u64)?;
        }
        if let Some(output) = &self.output {
            raw.set(META, "output", output.as_str())?;
        }
        Ok(())
    }

    /// Assigns `N`, `IU` and the `name=value` parameters onto an already
    /// resolved configuration. Entries derived from the overridden names keep
    /// the values computed from the document.
    pub fn apply_resolved(&self, config: &mut ResolvedConfig) {
        if let Some(population) = self.population {
            config.initial.insert("N".to_string(), Value::Integer(population));
        }
        if let Some(infected) = self.infected {
            config.initial.insert("IU".to_string(), Value::Integer(infected));
        }
        for (name, value) in &self.vars {
            debug!("override {} = {}", name, value);
            config.parameters.insert(name.clone(), Value::Float(*value));
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigResolver {
    overrides: Overrides,
    models: Vec<String>,
    provenance: Provenance,
    evaluator: ExpressionEvaluator,
}

impl ConfigResolver {
    /// Creates a resolver accepting the given model identifiers.
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            overrides: Overrides::default(),
            models: models.into_iter().map(Into::into).collect(),
            provenance: Provenance::current(),
            evaluator: ExpressionEvaluator::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    #[tracing::instrument(level = "debug", skip(self, raw))]
    pub fn resolve(&self, raw: &RawConfig, sample: u64) -> ResolveResult<ResolvedConfig> {
        let mut document = raw.clone();
        self.overrides.apply_meta(&mut document)?;

        let mut namespace = Namespace::new(sample);
        let mut meta = serde_yaml::Mapping::new();
        let mut initial = IndexMap::new();
        let mut parameters = IndexMap::new();
        let mut interventions = Vec::new();

        for (section, body) in document.document() {
            let section = section.as_str().ok_or_else(|| {
                ResolveError::InvalidDocument(format!("section name {:?} is not a string", section))
            })?;
            if body.is_null() {
                continue;
            }
            match section {
                META => {
                    meta = as_mapping(section, body)?.clone();
                }
                INITIAL => {
                    for (key, value) in as_mapping(section, body)? {
                        let key = key_str(section, key)?;
                        let value = literal(section, key, value)?;
                        namespace.insert(key, value);
                        initial.insert(key.to_string(), value);
                    }
                }
                PARAMETERS => {
                    parameters = self.resolve_parameters(
                        section,
                        as_mapping(section, body)?,
                        &mut namespace,
                    )?;
                }
                INTERVENTIONS => {
                    let blocks = body.as_sequence().ok_or_else(|| {
                        ResolveError::InvalidDocument(format!("{} must be a sequence", section))
                    })?;
                    for (index, block) in blocks.iter().enumerate() {
                        let name = format!("{}[{}]", section, index);
                        interventions.push(self.resolve_intervention(
                            &name,
                            as_mapping(&name, block)?,
                            &mut namespace,
                        )?);
                    }
                }
                other => warn!("Ignoring unknown configuration section {}", other),
            }
        }

        let mut meta: Meta = serde_yaml::from_value(serde_yaml::Value::Mapping(meta))
            .map_err(|e| ResolveError::InvalidDocument(format!("{}: {}", META, e)))?;
        self.validate_meta(&meta)?;
        meta.record_provenance(&self.provenance);

        let mut config = ResolvedConfig {
            meta,
            initial,
            parameters,
            interventions,
        };
        self.overrides.apply_resolved(&mut config);

        config
            .initial
            .entry("N".to_string())
            .or_insert(Value::Integer(DEFAULT_POPULATION));
        config
            .initial
            .entry("IU".to_string())
            .or_insert(Value::Integer(DEFAULT_INFECTED));

        Ok(config)
    }

    fn resolve_parameters(
        &self,
        section: &str,
        entries: &serde_yaml::Mapping,
        namespace: &mut Namespace,
    ) -> ResolveResult<IndexMap<String, Value>> {
        let mut resolved = IndexMap::new();
        for (key, value) in entries {
            let key = key_str(section, key)?;
            let value = match value {
                serde_yaml::Value::String(expression) => self
                    .evaluator
                    .eval_source(expression, namespace)
                    .map_err(|source| ResolveError::Expression {
                        section: section.to_string(),
                        key: key.to_string(),
                        source,
                    })?,
                other => literal(section, key, other)?,
            };
            debug!("{}.{} = {}", section, key, value);
            namespace.insert(key, value);
            resolved.insert(key.to_string(), value);
        }
        Ok(resolved)
    }

    fn resolve_intervention(
        &self,
        section: &str,
        block: &serde_yaml::Mapping,
        namespace: &mut Namespace,
    ) -> ResolveResult<Intervention> {
        let mut time = None;
        let mut parameters = IndexMap::new();
        let mut metadata = IndexMap::new();

        for (key, value) in block {
            let key = key_str(section, key)?;
            match key {
                "time" => time = Some(literal(section, key, value)?.as_f64()),
                PARAMETERS if value.is_null() => {}
                PARAMETERS => {
                    let name = format!("{}.{}", section, PARAMETERS);
                    parameters =
                        self.resolve_parameters(&name, as_mapping(&name, value)?, namespace)?;
                }
                _ => {
                    metadata.insert(key.to_string(), value.clone());
                }
            }
        }

        let time = time.ok_or_else(|| ResolveError::InvalidValue {
            section: section.to_string(),
            key: "time".to_string(),
            message: "intervention time is required".to_string(),
        })?;

        Ok(Intervention {
            time,
            parameters,
            metadata,
        })
    }

    fn validate_meta(&self, meta: &Meta) -> ResolveResult<()> {
        if !self.models.iter().any(|m| m == &meta.model) {
            return Err(ResolveError::UnknownModel(meta.model.clone()));
        }
        let invalid = |key: &str, message: &str| ResolveError::InvalidValue {
            section: META.to_string(),
            key: key.to_string(),
            message: message.to_string(),
        };
        if !(meta.tmax > meta.t0) {
            return Err(invalid("tmax", "tmax must be greater than t0"));
        }
        if meta.steps == 0 {
            return Err(invalid("steps", "at least one step is required"));
        }
        if meta.samples == 0 {
            return Err(invalid("samples", "at least one sample is required"));
        }
        Ok(())
    }
}

fn as_mapping<'a>(
    section: &str,
    value: &'a serde_yaml::Value,
) -> ResolveResult<&'a serde_yaml::Mapping> {
    value
        .as_mapping()
        .ok_or_else(|| ResolveError::InvalidDocument(format!("{} must be a mapping", section)))
}

fn key_str<'a>(section: &str, key: &'a serde_yaml::Value) -> ResolveResult<&'a str> {
    key.as_str().ok_or_else(|| {
        ResolveError::InvalidDocument(format!("{} has a non-string key {:?}", section, key))
    })
}

/// Converts a YAML number into a value; anything else is rejected.
fn literal(section: &str, key: &str, value: &serde_yaml::Value) -> ResolveResult<Value> {
    match value {
        serde_yaml::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Value::Integer(i)),
            (None, Some(x)) => Ok(Value::Float(x)),
            (None, None) => Err(ResolveError::InvalidValue {
                section: section.to_string(),
                key: key.to_string(),
                message: format!("unrepresentable number {}", n),
            }),
        },
        other => Err(ResolveError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            message: format!("expected a number, found {:?}", other),
        }),
    }
}
