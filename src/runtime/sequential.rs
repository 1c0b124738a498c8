use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{evaluate_in_order, RuntimeResult, Scheduler};
use crate::model::{SampleEvaluator, Trajectory};
use crate::sample::Sample;

/// Evaluates samples one after another on the calling task.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialScheduler;

#[async_trait]
impl Scheduler for SequentialScheduler {
    fn name(&self) -> &'static str {
        "sequential"
    }

    async fn map(
        &self,
        samples: &[Sample],
        evaluator: Arc<dyn SampleEvaluator>,
    ) -> RuntimeResult<Vec<Trajectory>> {
        info!("Evaluating {} samples sequentially", samples.len());
        evaluate_in_order(samples, evaluator.as_ref())
    }
}
