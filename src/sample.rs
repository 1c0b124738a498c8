use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{RawConfig, ResolvedConfig};
use crate::resolver::{ConfigResolver, ResolveResult};

/// One simulation run: a sample index and its resolved configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub index: usize,
    pub config: ResolvedConfig,
}

impl Sample {
    pub fn new(index: usize, mut config: ResolvedConfig) -> Self {
        config.meta.seed = index as u64;
        Self { index, config }
    }
}

/// Expands a configuration template into its ordered samples.
pub struct SampleBuilder<'a> {
    resolver: &'a ConfigResolver,
}

impl<'a> SampleBuilder<'a> {
    pub fn new(resolver: &'a ConfigResolver) -> Self {
        Self { resolver }
    }

    /// Resolves sample 0 to learn the sample count, then resolves every
    /// index from 0 independently.
    pub fn build(&self, template: &RawConfig) -> ResolveResult<Vec<Sample>> {
        let count = self.resolver.resolve(template, 0)?.meta.samples;
        info!("Building {} samples", count);
        self.build_count(template, count)
    }

    pub fn build_count(&self, template: &RawConfig, count: usize) -> ResolveResult<Vec<Sample>> {
        (0..count)
            .map(|index| {
                let config = self.resolver.resolve(template, index as u64)?;
                Ok(Sample::new(index, config))
            })
            .collect()
    }
}
