use std::sync::Arc;

use ptti::config::{RawConfig, ResolvedConfig};
use ptti::model::ModelRegistry;
use ptti::output::{read_tsv, sample_paths};
use ptti::resolver::Overrides;
use ptti::runtime::ExecutionMode;
use ptti::stats::aggregate;
use ptti::system::{write_batch, Simulation};
use ptti::PttiError;
use pretty_assertions::assert_eq;

const SEIR: &str = r#"
meta:
  model: SEIRODE
  tmax: 20
  steps: 20
  samples: 3
  title: pipeline
initial:
  N: 10000
  IU: 20
parameters:
  c: 13
  beta: 0.033 * uniform(0.8, 1.2)
interventions:
  - time: 10
    parameters:
      c: c / 2
"#;

fn simulation(output: &str, mode: ExecutionMode) -> Simulation {
    let overrides = Overrides {
        output: Some(output.to_string()),
        ..Overrides::default()
    };
    Simulation::new(Arc::new(ModelRegistry::with_builtins()), overrides, mode)
}

#[tokio::test]
async fn test_batch_writes_samples_and_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("seir").display().to_string();
    let template = RawConfig::from_str(SEIR).unwrap();

    let batch = simulation(&output, ExecutionMode::Sequential)
        .run(&template)
        .await
        .unwrap();
    assert_eq!(batch.samples.len(), 3);
    assert_eq!(batch.trajectories.len(), 3);

    let written = write_batch(&batch, true).unwrap();
    assert_eq!(written.len(), 8);
    assert!(written.iter().all(|path| path.exists()));

    for (sample, trajectory) in batch.samples.iter().zip(&batch.trajectories) {
        assert_eq!(sample.config.meta.seed, sample.index as u64);
        assert_eq!(trajectory.len(), 20);
        assert_eq!(trajectory.time.first(), Some(&0.0));
        assert_eq!(trajectory.time.last(), Some(&20.0));

        let (tsv, yaml) = sample_paths(&output, sample.index);
        assert_eq!(&read_tsv(&tsv).unwrap(), trajectory);
        assert_eq!(ResolvedConfig::load(&yaml).unwrap(), sample.config);
    }

    // distinct samples draw distinct parameters
    assert_ne!(
        batch.samples[0].config.parameters["beta"],
        batch.samples[1].config.parameters["beta"]
    );

    let expected = aggregate(&batch.trajectories).unwrap();
    assert_eq!(read_tsv(format!("{}-avg.tsv", output)).unwrap(), expected.mean);
    assert_eq!(read_tsv(format!("{}-std.tsv", output)).unwrap(), expected.std);
}

#[tokio::test]
async fn test_pool_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("seir").display().to_string();
    let template = RawConfig::from_str(SEIR).unwrap();

    let sequential = simulation(&output, ExecutionMode::Sequential)
        .run(&template)
        .await
        .unwrap();
    let pool = simulation(&output, ExecutionMode::Pool { workers: Some(2) })
        .run(&template)
        .await
        .unwrap();

    assert_eq!(sequential.trajectories, pool.trajectories);
    assert_eq!(
        sequential.samples.iter().map(|s| s.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[tokio::test]
async fn test_unresolvable_batch_runs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("broken").display().to_string();
    let template = RawConfig::from_str("meta:\n  model: SEIRODE\nparameters:\n  beta: missing * 2\n").unwrap();

    let error = simulation(&output, ExecutionMode::Sequential)
        .run(&template)
        .await
        .unwrap_err();
    assert!(matches!(error, PttiError::Resolve(_)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_initial_state_fills_susceptibles() {
    let template = RawConfig::from_str("meta:\n  model: SEIRODE\ninitial:\n  N: 500\n  IU: 5\n").unwrap();
    let state = simulation("unused", ExecutionMode::Sequential)
        .initial_state(&template)
        .unwrap();
    assert_eq!(state.population, 500.0);
    assert_eq!(state.values.iter().sum::<f64>(), 500.0);
}
