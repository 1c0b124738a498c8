//! Orchestration: resolve, build, schedule, write.
//!
//! Everything the binaries decide from flags and the environment arrives
//! here as explicit values ([`Overrides`], [`ExecutionMode`],
//! [`ClusterConfig`]).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::{save_yaml, RawConfig};
use crate::model::{ModelRegistry, ModelRunner, ModelState, SampleEvaluator, Trajectory};
use crate::output::{aggregate_paths, comparison_base, read_tsv, sample_paths, write_tsv};
use crate::resolver::{ConfigResolver, Overrides};
use crate::runtime::{serve_worker, ClusterConfig, ExecutionMode, TcpCommunicator};
use crate::sample::{Sample, SampleBuilder};
use crate::stats::{aggregate, available_columns, CompareOptions, Comparison};
use crate::PttiResult;

/// Samples of one batch with their trajectories, index-aligned.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub samples: Vec<Sample>,
    pub trajectories: Vec<Trajectory>,
}

pub struct Simulation {
    registry: Arc<ModelRegistry>,
    resolver: ConfigResolver,
    mode: ExecutionMode,
}

impl Simulation {
    pub fn new(registry: Arc<ModelRegistry>, overrides: Overrides, mode: ExecutionMode) -> Self {
        let resolver = ConfigResolver::new(registry.names()).with_overrides(overrides);
        Self {
            registry,
            resolver,
            mode,
        }
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    fn evaluator(&self) -> Arc<dyn SampleEvaluator> {
        Arc::new(ModelRunner::new(self.registry.clone()))
    }

    pub fn samples(&self, template: &RawConfig) -> PttiResult<Vec<Sample>> {
        Ok(SampleBuilder::new(&self.resolver).build(template)?)
    }

    /// Initial state of the configured model for sample 0.
    pub fn initial_state(&self, template: &RawConfig) -> PttiResult<ModelState> {
        let config = self.resolver.resolve(template, 0)?;
        let mut model = self.registry.create(&config.meta.model)?;
        model.set_parameters(&config.parameters);
        Ok(model.initial_conditions(&config.initial)?)
    }

    /// Resolves every sample, then evaluates the batch. No simulation starts
    /// unless every sample resolved.
    pub async fn run(&self, template: &RawConfig) -> PttiResult<BatchResult> {
        let samples = self.samples(template)?;
        let scheduler = self.mode.scheduler().await?;
        info!(
            "Running {} samples with the {} scheduler",
            samples.len(),
            scheduler.name()
        );
        let trajectories = scheduler.map(&samples, self.evaluator()).await?;
        Ok(BatchResult {
            samples,
            trajectories,
        })
    }

    /// Worker side of a distributed run. Returns once this rank's chunk has
    /// been reported; the caller is expected to exit.
    pub async fn serve(&self, cluster: &ClusterConfig) -> PttiResult<()> {
        let communicator = TcpCommunicator::connect(cluster).await?;
        serve_worker(&communicator, self.evaluator()).await?;
        Ok(())
    }
}

/// Writes each sample's trajectory and resolved configuration, and with
/// `statistics` the batch mean and standard deviation.
pub fn write_batch(batch: &BatchResult, statistics: bool) -> PttiResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (sample, trajectory) in batch.samples.iter().zip(&batch.trajectories) {
        let (tsv, yaml) = sample_paths(&sample.config.meta.output, sample.index);
        write_tsv(&tsv, trajectory)?;
        sample.config.save(&yaml)?;
        written.extend([tsv, yaml]);
    }

    if statistics {
        if let Some(first) = batch.samples.first() {
            let aggregate = aggregate(&batch.trajectories)?;
            let (avg, std) = aggregate_paths(&first.config.meta.output);
            write_tsv(&avg, &aggregate.mean)?;
            write_tsv(&std, &aggregate.std)?;
            written.extend([avg, std]);
        }
    }
    info!("Wrote {} files", written.len());
    Ok(written)
}

/// Trajectory files of one comparison, loaded before anything is computed.
#[derive(Debug, Clone)]
pub struct ComparisonInputs {
    pub input: Trajectory,
    pub reference: Trajectory,
    pub reference_std: Option<Trajectory>,
}

impl ComparisonInputs {
    pub fn load(input: &Path, reference: &Path, reference_std: Option<&Path>) -> PttiResult<Self> {
        Ok(Self {
            input: read_tsv(input)?,
            reference: read_tsv(reference)?,
            reference_std: reference_std.map(read_tsv).transpose()?,
        })
    }

    /// Column count compared when none is requested: the smaller value
    /// column count of the two runs.
    pub fn default_columns(&self) -> usize {
        available_columns(&self.input, &self.reference)
    }

    /// Compares the loaded runs and writes the error series and report next
    /// to `input_path`. Nothing is written unless the comparison succeeds.
    pub fn compare(
        &self,
        input_path: &Path,
        options: CompareOptions,
    ) -> PttiResult<(Comparison, Vec<PathBuf>)> {
        let comparison = Comparison::compute(
            &self.input,
            &self.reference,
            self.reference_std.as_ref(),
            options,
        )?;

        let base = comparison_base(input_path);
        let mut written = Vec::new();
        let mut write = |suffix: &str, trajectory: &Trajectory| -> PttiResult<()> {
            let path = PathBuf::from(format!("{}-{}.tsv", base, suffix));
            write_tsv(&path, trajectory)?;
            written.push(path);
            Ok(())
        };
        write("abserr", &comparison.abserr)?;
        write("relerr", &comparison.relerr)?;
        if let Some(stderr) = &comparison.stderr {
            write("stderr", stderr)?;
        }

        let report = PathBuf::from(format!("{}-err.yaml", base));
        save_yaml(&comparison.report, &report)?;
        written.push(report);

        Ok((comparison, written))
    }
}

/// Compares two trajectory files and writes the error series and report
/// next to `input`. Nothing is written unless the comparison succeeds.
pub fn compare_files(
    input: &Path,
    reference: &Path,
    reference_std: Option<&Path>,
    options: CompareOptions,
) -> PttiResult<(Comparison, Vec<PathBuf>)> {
    ComparisonInputs::load(input, reference, reference_std)?.compare(input, options)
}
