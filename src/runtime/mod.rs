//! # Execution Engine
//!
//! Maps an ordered sequence of samples to their trajectories. Every strategy
//! implements [`Scheduler`] and returns trajectories index-aligned with the
//! input samples, whatever order the work actually completes in.
//!
//! - [`SequentialScheduler`] evaluates in order on the calling task.
//! - [`PoolScheduler`] fans out over a bounded pool of blocking workers.
//! - [`DistributedScheduler`] scatters contiguous chunks to ranked workers
//!   and gathers them back in rank order.
//!
//! A failing sample fails the whole batch. Nothing is retried.

pub mod distributed;
pub mod pool;
pub mod sequential;
pub mod transport;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{ModelError, SampleEvaluator, Trajectory};
use crate::sample::Sample;

pub use distributed::{serve_worker, ClusterConfig, Communicator, DistributedScheduler, WorkerReport};
pub use pool::PoolScheduler;
pub use sequential::SequentialScheduler;
pub use transport::{LocalCommunicator, TcpCommunicator};

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Sample {index} failed: {source}")]
    Evaluation {
        index: usize,
        #[source]
        source: ModelError,
    },
    #[error("Worker {rank} failed: {reason}")]
    WorkerFailed { rank: usize, reason: String },
    #[error("Worker task aborted: {0}")]
    Join(String),
    #[error("Distributed execution unavailable: {0}")]
    DistributedUnavailable(String),
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("Codec error: {0}")]
    Codec(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[async_trait]
pub trait Scheduler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Evaluates every sample, returning trajectories in sample order.
    async fn map(
        &self,
        samples: &[Sample],
        evaluator: Arc<dyn SampleEvaluator>,
    ) -> RuntimeResult<Vec<Trajectory>>;
}

/// How a batch is scheduled.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExecutionMode {
    #[default]
    Sequential,
    /// Local pool; `None` uses the available parallelism.
    Pool { workers: Option<usize> },
    Distributed(ClusterConfig),
}

impl ExecutionMode {
    /// Builds the scheduler for this mode. Distributed mode connects to the
    /// cluster, so only the coordinator (rank 0) should call this.
    pub async fn scheduler(&self) -> RuntimeResult<Box<dyn Scheduler>> {
        let scheduler: Box<dyn Scheduler> = match self {
            ExecutionMode::Sequential => Box::new(SequentialScheduler),
            ExecutionMode::Pool { workers } => Box::new(match workers {
                Some(workers) => PoolScheduler::new(*workers),
                None => PoolScheduler::default(),
            }),
            ExecutionMode::Distributed(cluster) => {
                let communicator = TcpCommunicator::connect(cluster).await?;
                Box::new(DistributedScheduler::new(Arc::new(communicator)))
            }
        };
        Ok(scheduler)
    }
}

/// Evaluates `samples` in order on the current thread.
pub(crate) fn evaluate_in_order(
    samples: &[Sample],
    evaluator: &dyn SampleEvaluator,
) -> RuntimeResult<Vec<Trajectory>> {
    samples
        .iter()
        .map(|sample| {
            evaluator
                .evaluate(sample)
                .map_err(|source| RuntimeError::Evaluation {
                    index: sample.index,
                    source,
                })
        })
        .collect()
}

/// Splits `items` into `parts` contiguous chunks of `ceil(len / parts)`.
///
/// Concatenating the chunks restores `items`. Trailing chunks are empty when
/// the items run out before the parts do.
pub fn partition<T: Clone>(items: &[T], parts: usize) -> Vec<Vec<T>> {
    if parts == 0 {
        return Vec::new();
    }
    let size = items.len().div_ceil(parts);
    (0..parts)
        .map(|i| {
            let start = (i * size).min(items.len());
            let end = ((i + 1) * size).min(items.len());
            items[start..end].to_vec()
        })
        .collect()
}
