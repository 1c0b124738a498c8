use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::{RuntimeError, RuntimeResult, Scheduler};
use crate::model::{SampleEvaluator, Trajectory};
use crate::sample::Sample;

/// Evaluates samples on a bounded pool of blocking worker threads.
///
/// At most `workers` samples run at once. Results are joined in submission
/// order, so the output lines up with the input no matter which sample
/// finishes first.
///
/// The first failing sample fails the batch. Evaluations already running on
/// blocking threads are not cancelled; they run to completion and their
/// results are discarded.
#[derive(Debug, Clone)]
pub struct PoolScheduler {
    workers: usize,
}

impl Default for PoolScheduler {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(workers)
    }
}

impl PoolScheduler {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

#[async_trait]
impl Scheduler for PoolScheduler {
    fn name(&self) -> &'static str {
        "pool"
    }

    async fn map(
        &self,
        samples: &[Sample],
        evaluator: Arc<dyn SampleEvaluator>,
    ) -> RuntimeResult<Vec<Trajectory>> {
        info!(
            "Evaluating {} samples on {} workers",
            samples.len(),
            self.workers
        );
        let permits = Arc::new(Semaphore::new(self.workers));

        let tasks = samples.iter().cloned().map(|sample| {
            let permits = permits.clone();
            let evaluator = evaluator.clone();
            async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| RuntimeError::Join(e.to_string()))?;
                let index = sample.index;
                debug!("Dispatching sample {}", index);
                tokio::task::spawn_blocking(move || evaluator.evaluate(&sample))
                    .await
                    .map_err(|e| RuntimeError::Join(e.to_string()))?
                    .map_err(|source| RuntimeError::Evaluation { index, source })
            }
        });

        try_join_all(tasks).await
    }
}
