//! Scatter/gather execution across ranked workers.
//!
//! Rank 0 coordinates: it partitions the samples into one contiguous chunk
//! per rank, keeps chunk 0 for itself, and gathers every rank's report back
//! in ascending rank order. Because chunks are contiguous and gathered in
//! rank order, concatenating the reports restores sample order.
//!
//! Every other rank runs [`serve_worker`] once and then exits.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};

use super::{evaluate_in_order, partition, RuntimeError, RuntimeResult, Scheduler};
use crate::model::{SampleEvaluator, Trajectory};
use crate::sample::Sample;

/// Identity of this process within a distributed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub rank: usize,
    pub size: usize,
    /// `host:port` the coordinator listens on and the workers connect to.
    pub coordinator: Option<String>,
}

impl ClusterConfig {
    pub fn is_coordinator(&self) -> bool {
        self.rank == 0
    }
}

/// What a rank sends back for its chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerReport {
    Completed(Vec<Trajectory>),
    Failed(String),
}

/// Collective operations between the ranks of one run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// On rank 0, sends `chunks[r]` to each rank `r` and returns chunk 0.
    /// Elsewhere, `chunks` is ignored and the chunk sent by rank 0 is
    /// returned.
    async fn scatter(&self, chunks: Option<Vec<Vec<Sample>>>) -> RuntimeResult<Vec<Sample>>;

    /// On rank 0, returns every rank's report in rank order, its own first.
    /// Elsewhere, sends `report` to rank 0 and returns `None`.
    async fn gather(&self, report: WorkerReport) -> RuntimeResult<Option<Vec<WorkerReport>>>;
}

async fn evaluate_chunk(chunk: Vec<Sample>, evaluator: Arc<dyn SampleEvaluator>) -> WorkerReport {
    let result = tokio::task::spawn_blocking(move || evaluate_in_order(&chunk, evaluator.as_ref()))
        .await
        .map_err(|e| RuntimeError::Join(e.to_string()))
        .and_then(|result| result);
    match result {
        Ok(trajectories) => WorkerReport::Completed(trajectories),
        Err(e) => WorkerReport::Failed(e.to_string()),
    }
}

/// Coordinator half of the distributed protocol.
pub struct DistributedScheduler {
    communicator: Arc<dyn Communicator>,
}

impl DistributedScheduler {
    pub fn new(communicator: Arc<dyn Communicator>) -> Self {
        Self { communicator }
    }
}

#[async_trait]
impl Scheduler for DistributedScheduler {
    fn name(&self) -> &'static str {
        "distributed"
    }

    async fn map(
        &self,
        samples: &[Sample],
        evaluator: Arc<dyn SampleEvaluator>,
    ) -> RuntimeResult<Vec<Trajectory>> {
        let comm = &self.communicator;
        let span = info_span!("coordinator", rank = comm.rank(), size = comm.size());
        async move {
            if comm.rank() != 0 {
                return Err(RuntimeError::Protocol(format!(
                    "rank {} cannot coordinate",
                    comm.rank()
                )));
            }
            let chunks = partition(samples, comm.size());
            info!(
                "Scattering {} samples in chunks of {}",
                samples.len(),
                chunks.first().map_or(0, Vec::len)
            );

            let chunk = comm.scatter(Some(chunks)).await?;
            info!("Processing chunk of size {}", chunk.len());
            let report = evaluate_chunk(chunk, evaluator).await;

            let reports = comm.gather(report).await?.ok_or_else(|| {
                RuntimeError::Protocol("coordinator gathered no reports".to_string())
            })?;
            if reports.len() != comm.size() {
                return Err(RuntimeError::Protocol(format!(
                    "expected {} reports, gathered {}",
                    comm.size(),
                    reports.len()
                )));
            }

            let mut trajectories = Vec::with_capacity(samples.len());
            for (rank, report) in reports.into_iter().enumerate() {
                match report {
                    WorkerReport::Completed(chunk) => trajectories.extend(chunk),
                    WorkerReport::Failed(reason) => {
                        return Err(RuntimeError::WorkerFailed { rank, reason })
                    }
                }
            }
            if trajectories.len() != samples.len() {
                return Err(RuntimeError::Protocol(format!(
                    "expected {} trajectories, gathered {}",
                    samples.len(),
                    trajectories.len()
                )));
            }
            Ok(trajectories)
        }
        .instrument(span)
        .await
    }
}

/// Worker half: receive a chunk, evaluate it, report back.
pub async fn serve_worker(
    communicator: &dyn Communicator,
    evaluator: Arc<dyn SampleEvaluator>,
) -> RuntimeResult<()> {
    let span = info_span!("worker", rank = communicator.rank(), size = communicator.size());
    async move {
        info!("Worker running");
        let chunk = communicator.scatter(None).await?;
        info!("Processing chunk of size {}", chunk.len());
        let report = evaluate_chunk(chunk, evaluator).await;
        communicator.gather(report).await?;
        info!("Done");
        Ok(())
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedConfig;
    use crate::model::{ModelError, ModelResult};
    use mockall::predicate::*;

    fn samples(count: usize) -> Vec<Sample> {
        (0..count)
            .map(|i| Sample::new(i, ResolvedConfig::default()))
            .collect()
    }

    fn marker(sample: &Sample) -> ModelResult<Trajectory> {
        Ok(Trajectory::new(
            vec![0.0],
            vec![vec![sample.index as f64]],
        ))
    }

    #[tokio::test]
    async fn test_coordinator_concatenates_in_rank_order() {
        let input = samples(5);
        let remote = partition(&input, 2)[1].clone();

        let mut comm = MockCommunicator::new();
        comm.expect_rank().return_const(0usize);
        comm.expect_size().return_const(2usize);
        comm.expect_scatter()
            .withf(|chunks| chunks.as_ref().map(|c| c.iter().map(Vec::len).collect::<Vec<_>>()) == Some(vec![3, 2]))
            .times(1)
            .returning(|chunks| Ok(chunks.unwrap_or_default().remove(0)));
        comm.expect_gather().times(1).returning(move |own| {
            let remote = remote.iter().map(|s| marker(s).unwrap()).collect();
            Ok(Some(vec![own, WorkerReport::Completed(remote)]))
        });

        let scheduler = DistributedScheduler::new(Arc::new(comm));
        let trajectories = scheduler.map(&input, Arc::new(marker)).await.unwrap();

        let order: Vec<f64> = trajectories.iter().map(|t| t.rows[0][0]).collect();
        assert_eq!(order, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_failed_worker_aborts_the_batch() {
        let mut comm = MockCommunicator::new();
        comm.expect_rank().return_const(0usize);
        comm.expect_size().return_const(2usize);
        comm.expect_scatter()
            .returning(|chunks| Ok(chunks.unwrap_or_default().remove(0)));
        comm.expect_gather().returning(|own| {
            Ok(Some(vec![own, WorkerReport::Failed("boom".to_string())]))
        });

        let scheduler = DistributedScheduler::new(Arc::new(comm));
        let result = scheduler.map(&samples(4), Arc::new(marker)).await;
        assert!(matches!(
            result,
            Err(RuntimeError::WorkerFailed { rank: 1, ref reason }) if reason == "boom"
        ));
    }

    #[tokio::test]
    async fn test_worker_reports_its_chunk() {
        let mut comm = MockCommunicator::new();
        comm.expect_rank().return_const(1usize);
        comm.expect_size().return_const(2usize);
        comm.expect_scatter()
            .with(eq(None))
            .times(1)
            .returning(|_| Ok(samples(3)[2..].to_vec()));
        comm.expect_gather()
            .withf(|report| {
                *report
                    == WorkerReport::Completed(vec![Trajectory::new(vec![0.0], vec![vec![2.0]])])
            })
            .times(1)
            .returning(|_| Ok(None));

        serve_worker(&comm, Arc::new(marker)).await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_reports_failures() {
        let mut comm = MockCommunicator::new();
        comm.expect_rank().return_const(1usize);
        comm.expect_size().return_const(2usize);
        comm.expect_scatter().returning(|_| Ok(samples(1)));
        comm.expect_gather()
            .withf(|report| matches!(report, WorkerReport::Failed(reason) if reason.contains("Sample 0")))
            .times(1)
            .returning(|_| Ok(None));

        let failing = |_: &Sample| -> ModelResult<Trajectory> {
            Err(ModelError::Integration("diverged".to_string()))
        };
        serve_worker(&comm, Arc::new(failing)).await.unwrap();
    }
}
