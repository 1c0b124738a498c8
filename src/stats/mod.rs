//! # Statistics
//!
//! Batch aggregation ([`aggregate`]) and pairwise trajectory comparison
//! ([`Comparison`]). Both treat the time vector as an axis: it is checked,
//! carried through unchanged, and never averaged or differenced.

pub mod aggregate;
pub mod compare;

use thiserror::Error;

pub use aggregate::{aggregate, Aggregate};
pub use compare::{available_columns, CompareOptions, Comparison, ErrorReport};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("Cannot aggregate an empty batch")]
    EmptyBatch,
    #[error("Trajectory {index} does not match the batch shape: {message}")]
    ShapeMismatch { index: usize, message: String },
    #[error("The two time axes don't match: {0}")]
    TimeAxisMismatch(String),
    #[error("Not enough columns: requested {requested}, available {available}")]
    NotEnoughColumns { requested: usize, available: usize },
    #[error("Invalid reference standard deviation data: {0}")]
    InvalidReferenceStd(String),
    #[error("The time axis spans no time")]
    DegenerateTimeAxis,
}

pub type StatsResult<T> = Result<T, StatsError>;

/// Trapezoidal integral of `y` over `x`.
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trapezoid() {
        assert_eq!(trapezoid(&[1.0, 1.0, 1.0], &[0.0, 1.0, 3.0]), 3.0);
        assert_eq!(trapezoid(&[0.0, 2.0], &[0.0, 1.0]), 1.0);
        assert_eq!(trapezoid(&[5.0], &[0.0]), 0.0);
    }
}
