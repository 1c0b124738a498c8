use ptti::config::RawConfig;
use ptti::eval::{EvalError, Value};
use ptti::model::ModelRegistry;
use ptti::resolver::{ConfigResolver, Overrides, ResolveError};
use ptti::sample::SampleBuilder;
use ptti::PttiError;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const STOCHASTIC: &str = r#"
meta:
  model: SEIRODE
  samples: 3
initial:
  N: 10000
  IU: 20
parameters:
  c: 13
  beta: lognormal(log(0.033), 0.1)
  R0: beta * c / 0.1429
  seed_scale: uniform(0.5, 1.5) * (sample + 1)
interventions:
  - time: 60
    name: distancing
    parameters:
      c: c * uniform(0.2, 0.4)
"#;

fn resolver() -> ConfigResolver {
    ConfigResolver::new(ModelRegistry::with_builtins().names())
}

#[test]
fn test_parameters_follow_declaration_order() {
    let raw = RawConfig::from_str("parameters:\n  a: '2.0'\n  b: a*3\n").unwrap();
    let config = resolver().resolve(&raw, 0).unwrap();

    let resolved: Vec<(&str, Value)> = config
        .parameters
        .iter()
        .map(|(k, v)| (k.as_str(), *v))
        .collect();
    assert_eq!(resolved, vec![("a", Value::Float(2.0)), ("b", Value::Float(6.0))]);
}

#[test]
fn test_undefined_name_is_a_resolution_error() {
    let raw = RawConfig::from_str("parameters:\n  b: c*3\n").unwrap();
    let error = resolver().resolve(&raw, 0).unwrap_err();

    assert!(error.to_string().contains("parameters.b"));
    match error {
        ResolveError::Expression { key, source, .. } => {
            assert_eq!(key, "b");
            assert_eq!(source, EvalError::UndefinedName("c".to_string()));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_unknown_model_maps_to_its_exit_code() {
    let raw = RawConfig::from_str("meta:\n  model: NoSuchModel\n").unwrap();
    let error: PttiError = resolver().resolve(&raw, 0).unwrap_err().into();
    assert_eq!(error.exit_code(), 255);
}

#[test]
fn test_arbitrary_code_is_not_evaluated() {
    let raw = RawConfig::from_str("parameters:\n  x: __import__('os')\n").unwrap();
    assert!(resolver().resolve(&raw, 0).is_err());

    let raw = RawConfig::from_str("parameters:\n  x: system(1)\n").unwrap();
    assert!(matches!(
        resolver().resolve(&raw, 0),
        Err(ResolveError::Expression {
            source: EvalError::UnknownFunction(_),
            ..
        })
    ));
}

#[test]
fn test_overrides_reach_every_sample() {
    let raw = RawConfig::from_str(STOCHASTIC).unwrap();
    let overrides = Overrides {
        samples: Some(5),
        vars: vec![("c".to_string(), 10.0)],
        ..Overrides::default()
    };
    let resolver = resolver().with_overrides(overrides);
    let samples = SampleBuilder::new(&resolver).build(&raw).unwrap();

    assert_eq!(samples.len(), 5);
    for sample in &samples {
        assert_eq!(sample.config.parameters["c"], Value::Float(10.0));
        assert_eq!(sample.config.meta.seed, sample.index as u64);
        // the intervention was resolved against the document's c = 13
        let c = sample.config.interventions[0].parameters["c"].as_f64();
        assert!((2.6..=5.2).contains(&c));
        let r0 = sample.config.parameters["R0"].as_f64();
        let beta = sample.config.parameters["beta"].as_f64();
        assert!((r0 - beta * 13.0 / 0.1429).abs() < 1e-9);
    }
}

#[test]
fn test_override_does_not_reach_dependents() {
    let raw = RawConfig::from_str("parameters:\n  c: 13\n  d: c*2\n").unwrap();
    let overrides = Overrides {
        vars: vec![("c".to_string(), 5.0)],
        ..Overrides::default()
    };
    let config = resolver().with_overrides(overrides).resolve(&raw, 0).unwrap();

    assert_eq!(config.parameters["c"], Value::Float(5.0));
    assert_eq!(config.parameters["d"], Value::Integer(26));
}

proptest! {
    #[test]
    fn prop_resolution_is_deterministic(sample in 0u64..10_000) {
        let raw = RawConfig::from_str(STOCHASTIC).unwrap();
        let resolver = resolver();
        let first = resolver.resolve(&raw, sample).unwrap();
        let second = resolver.resolve(&raw, sample).unwrap();
        prop_assert_eq!(first, second);
    }
}
