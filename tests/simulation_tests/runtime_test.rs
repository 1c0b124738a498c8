use std::sync::Arc;
use std::time::Duration;

use ptti::model::{ModelError, ModelResult, SampleEvaluator, Trajectory};
use ptti::runtime::{
    serve_worker, Communicator, DistributedScheduler, LocalCommunicator, PoolScheduler,
    RuntimeError, Scheduler, SequentialScheduler,
};
use ptti::sample::Sample;
use proptest::prelude::*;

use super::{marker, samples};

/// Finishes later samples first so completion order is the reverse of
/// submission order.
fn reversed(count: usize) -> impl Fn(&Sample) -> ModelResult<Trajectory> + Send + Sync {
    move |sample: &Sample| {
        std::thread::sleep(Duration::from_millis(((count - sample.index) * 3) as u64));
        marker(sample)
    }
}

fn order(trajectories: &[Trajectory]) -> Vec<usize> {
    trajectories.iter().map(|t| t.rows[0][0] as usize).collect()
}

async fn distributed(
    input: &[Sample],
    size: usize,
    evaluator: Arc<dyn SampleEvaluator>,
) -> Result<Vec<Trajectory>, RuntimeError> {
    let mut group = LocalCommunicator::group(size).into_iter();
    let coordinator = group.next().expect("coordinator");
    let workers: Vec<_> = group
        .map(|worker| {
            let evaluator = evaluator.clone();
            tokio::spawn(async move { serve_worker(&worker, evaluator).await })
        })
        .collect();

    let result = DistributedScheduler::new(Arc::new(coordinator))
        .map(input, evaluator)
        .await;
    for worker in workers {
        worker.await.expect("worker task").expect("worker protocol");
    }
    result
}

#[tokio::test]
async fn test_sequential_preserves_order() {
    let input = samples(6);
    let output = SequentialScheduler
        .map(&input, Arc::new(marker))
        .await
        .unwrap();
    assert_eq!(order(&output), (0..6).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_pool_preserves_order_when_completion_is_reversed() {
    let input = samples(8);
    let output = PoolScheduler::new(4)
        .map(&input, Arc::new(reversed(8)))
        .await
        .unwrap();
    assert_eq!(order(&output), (0..8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_pool_fails_the_whole_batch() {
    let failing = |sample: &Sample| -> ModelResult<Trajectory> {
        if sample.index == 3 {
            Err(ModelError::Integration("diverged".to_string()))
        } else {
            marker(sample)
        }
    };
    let result = PoolScheduler::new(2).map(&samples(5), Arc::new(failing)).await;
    assert!(matches!(result, Err(RuntimeError::Evaluation { index: 3, .. })));
}

#[tokio::test]
async fn test_distributed_with_more_ranks_than_samples() {
    let input = samples(2);
    let output = distributed(&input, 4, Arc::new(marker)).await.unwrap();
    assert_eq!(order(&output), vec![0, 1]);
}

#[tokio::test]
async fn test_distributed_worker_failure_aborts() {
    let failing = |sample: &Sample| -> ModelResult<Trajectory> {
        if sample.index == 4 {
            Err(ModelError::Integration("diverged".to_string()))
        } else {
            marker(sample)
        }
    };
    let result = distributed(&samples(5), 2, Arc::new(failing)).await;
    assert!(matches!(result, Err(RuntimeError::WorkerFailed { rank: 1, .. })));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_every_strategy_preserves_order(count in 1usize..24, size in 1usize..6) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let input = samples(count);
        let expected: Vec<usize> = (0..count).collect();

        let sequential = runtime.block_on(SequentialScheduler.map(&input, Arc::new(marker))).unwrap();
        let pool = runtime
            .block_on(PoolScheduler::new(size).map(&input, Arc::new(reversed(count))))
            .unwrap();
        let distributed = runtime
            .block_on(distributed(&input, size, Arc::new(marker)))
            .unwrap();

        prop_assert_eq!(order(&sequential), expected.clone());
        prop_assert_eq!(order(&pool), expected.clone());
        prop_assert_eq!(order(&distributed), expected);
    }
}

#[test]
fn test_local_group_ranks() {
    let group = LocalCommunicator::group(3);
    let ranks: Vec<(usize, usize)> = group.iter().map(|c| (c.rank(), c.size())).collect();
    assert_eq!(ranks, vec![(0, 3), (1, 3), (2, 3)]);
}
