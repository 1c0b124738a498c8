use tracing::info;

use super::{StatsError, StatsResult};
use crate::model::Trajectory;

/// Elementwise mean and population standard deviation of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub mean: Trajectory,
    pub std: Trajectory,
}

fn check_shape(index: usize, trajectory: &Trajectory, reference: &Trajectory) -> StatsResult<()> {
    let mismatch = |message: String| StatsError::ShapeMismatch { index, message };
    if !trajectory.is_rectangular() {
        return Err(mismatch("rows do not line up with the time vector".to_string()));
    }
    if trajectory.len() != reference.len() || trajectory.columns() != reference.columns() {
        return Err(mismatch(format!(
            "{}x{} against {}x{}",
            trajectory.len(),
            trajectory.columns(),
            reference.len(),
            reference.columns()
        )));
    }
    if let Some(row) = (0..reference.len()).find(|&r| trajectory.time[r] != reference.time[r]) {
        return Err(mismatch(format!(
            "time {} differs from {} at row {}",
            trajectory.time[row], reference.time[row], row
        )));
    }
    Ok(())
}

/// Aggregates a batch sharing one time vector.
///
/// Every trajectory must have the shape and time values of the first. The
/// mean is accumulated as offsets from the first trajectory, so a batch of
/// identical copies reproduces it exactly with zero deviation.
pub fn aggregate(batch: &[Trajectory]) -> StatsResult<Aggregate> {
    let first = batch.first().ok_or(StatsError::EmptyBatch)?;
    for (index, trajectory) in batch.iter().enumerate() {
        check_shape(index, trajectory, first)?;
    }
    info!(
        "Aggregating {} trajectories of {}x{}",
        batch.len(),
        first.len(),
        first.columns()
    );

    let n = batch.len() as f64;
    let mut mean = first.rows.clone();
    let mut std = first.rows.clone();

    for (r, (mean_row, std_row)) in mean.iter_mut().zip(std.iter_mut()).enumerate() {
        for (c, (m, s)) in mean_row.iter_mut().zip(std_row.iter_mut()).enumerate() {
            let origin = first.rows[r][c];
            let offset: f64 = batch.iter().map(|t| t.rows[r][c] - origin).sum();
            *m = origin + offset / n;
            let variance: f64 = batch
                .iter()
                .map(|t| (t.rows[r][c] - *m).powi(2))
                .sum::<f64>()
                / n;
            *s = variance.sqrt();
        }
    }

    Ok(Aggregate {
        mean: Trajectory::new(first.time.clone(), mean),
        std: Trajectory::new(first.time.clone(), std),
    })
}
