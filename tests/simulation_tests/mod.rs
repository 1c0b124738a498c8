mod compare_test;
mod pipeline_test;
mod resolver_test;
mod runtime_test;

use ptti::config::ResolvedConfig;
use ptti::model::{ModelResult, Trajectory};
use ptti::sample::Sample;

pub fn samples(count: usize) -> Vec<Sample> {
    (0..count)
        .map(|i| Sample::new(i, ResolvedConfig::default()))
        .collect()
}

/// A one-row trajectory recording which sample produced it.
pub fn marker(sample: &Sample) -> ModelResult<Trajectory> {
    Ok(Trajectory::new(vec![0.0], vec![vec![sample.index as f64]]))
}
