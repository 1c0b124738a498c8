//! Comparison of an input trajectory against a reference.
//!
//! Produces absolute, relative and (given the reference's standard
//! deviation) normalised error series over the leading value columns, and
//! for each series a scalar: the trapezoidal time integral of the absolute
//! error divided by the elapsed time.
//!
//! Where a divisor is exactly zero it is taken as infinite, so the error at
//! that point is zero rather than a fault.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{trapezoid, StatsError, StatsResult};
use crate::model::Trajectory;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompareOptions {
    /// Number of leading value columns to compare. `None` compares every
    /// column both inputs have.
    pub columns: Option<usize>,
    /// Leading rows dropped from every input before comparing.
    pub skip: usize,
}

/// Time-weighted mean absolute error per compared column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub abserr: Vec<f64>,
    pub relerr: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Number of value columns compared.
    pub columns: usize,
    pub abserr: Trajectory,
    pub relerr: Trajectory,
    pub stderr: Option<Trajectory>,
    pub report: ErrorReport,
}

fn skip_rows(trajectory: &Trajectory, skip: usize) -> Trajectory {
    Trajectory::new(
        trajectory.time.iter().skip(skip).copied().collect(),
        trajectory.rows.iter().skip(skip).cloned().collect(),
    )
}

fn divide(numerator: &Trajectory, divisor: &Trajectory) -> Trajectory {
    let rows = numerator
        .rows
        .iter()
        .zip(&divisor.rows)
        .map(|(row, by)| {
            row.iter()
                .zip(by)
                .map(|(x, d)| x / if *d != 0.0 { *d } else { f64::INFINITY })
                .collect()
        })
        .collect();
    Trajectory::new(numerator.time.clone(), rows)
}

/// Time integral of `|error|` per column over the elapsed time.
fn integrated(error: &Trajectory, elapsed: f64) -> Vec<f64> {
    (0..error.columns())
        .map(|c| {
            let magnitude: Vec<f64> = error.rows.iter().map(|row| row[c].abs()).collect();
            trapezoid(&magnitude, &error.time) / elapsed
        })
        .collect()
}

/// Value columns present in both runs.
pub fn available_columns(input: &Trajectory, reference: &Trajectory) -> usize {
    input.columns().min(reference.columns())
}

impl Comparison {
    /// Compares `input` against `reference`. Every precondition is checked
    /// before anything is computed.
    pub fn compute(
        input: &Trajectory,
        reference: &Trajectory,
        reference_std: Option<&Trajectory>,
        options: CompareOptions,
    ) -> StatsResult<Self> {
        let input = skip_rows(input, options.skip);
        let reference = skip_rows(reference, options.skip);
        let reference_std = reference_std.map(|std| skip_rows(std, options.skip));

        for (name, trajectory) in [("input", &input), ("reference", &reference)] {
            if !trajectory.is_rectangular() {
                return Err(StatsError::TimeAxisMismatch(format!(
                    "{} rows do not line up with its time vector",
                    name
                )));
            }
        }
        if let Some(std) = &reference_std {
            if !std.is_rectangular()
                || std.len() != reference.len()
                || std.columns() != reference.columns()
            {
                return Err(StatsError::InvalidReferenceStd(format!(
                    "{}x{} against reference {}x{}",
                    std.len(),
                    std.columns(),
                    reference.len(),
                    reference.columns()
                )));
            }
        }

        let available = available_columns(&input, &reference);
        let columns = match options.columns {
            None => available,
            Some(requested) if requested > available => {
                return Err(StatsError::NotEnoughColumns {
                    requested,
                    available,
                })
            }
            Some(requested) => requested,
        };

        if input.len() != reference.len() {
            return Err(StatsError::TimeAxisMismatch(format!(
                "{} rows against {}",
                input.len(),
                reference.len()
            )));
        }
        if let Some(row) = (0..input.len()).find(|&r| input.time[r] != reference.time[r]) {
            return Err(StatsError::TimeAxisMismatch(format!(
                "time {} against {} at row {}",
                input.time[row], reference.time[row], row
            )));
        }

        let elapsed = match (input.time.first(), input.time.last()) {
            (Some(start), Some(end)) if end - start != 0.0 => end - start,
            _ => return Err(StatsError::DegenerateTimeAxis),
        };

        info!("Comparing first {} columns over {} rows", columns, input.len());

        let leading = |trajectory: &Trajectory| {
            Trajectory::new(
                trajectory.time.clone(),
                trajectory.rows.iter().map(|row| row[..columns].to_vec()).collect(),
            )
        };
        let input = leading(&input);
        let reference = leading(&reference);

        let abserr = Trajectory::new(
            input.time.clone(),
            input
                .rows
                .iter()
                .zip(&reference.rows)
                .map(|(x, r)| x.iter().zip(r).map(|(x, r)| x - r).collect())
                .collect(),
        );
        let relerr = divide(&abserr, &reference);
        let stderr = reference_std.map(|std| divide(&abserr, &leading(&std)));

        let report = ErrorReport {
            abserr: integrated(&abserr, elapsed),
            relerr: integrated(&relerr, elapsed),
            stderr: stderr.as_ref().map(|e| integrated(e, elapsed)),
        };
        debug!("Error report: {:?}", report);

        Ok(Self {
            columns,
            abserr,
            relerr,
            stderr,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn series(rows: Vec<Vec<f64>>) -> Trajectory {
        Trajectory::new((0..rows.len()).map(|t| t as f64 * 2.0).collect(), rows)
    }

    #[test]
    fn test_identical_inputs_have_zero_error() {
        let a = series(vec![vec![1.0, 0.0, 3.0], vec![2.0, 5.0, 0.0], vec![4.0, 1.0, 1.0]]);
        let std = series(vec![vec![0.5, 0.0, 1.0]; 3]);
        let comparison = Comparison::compute(&a, &a, Some(&std), CompareOptions::default()).unwrap();

        assert_eq!(comparison.columns, 3);
        for error in [&comparison.abserr, &comparison.relerr, comparison.stderr.as_ref().unwrap()] {
            assert_eq!(error.time, a.time);
            assert!(error.rows.iter().flatten().all(|v| *v == 0.0));
        }
        assert_eq!(comparison.report.abserr, vec![0.0; 3]);
        assert_eq!(comparison.report.relerr, vec![0.0; 3]);
        assert_eq!(comparison.report.stderr, Some(vec![0.0; 3]));
    }

    #[test]
    fn test_zero_reference_gives_zero_relative_error() {
        let input = series(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let reference = series(vec![vec![0.0, 1.0], vec![2.0, 0.0]]);
        let std = series(vec![vec![0.0, 0.5], vec![0.5, 0.0]]);
        let comparison =
            Comparison::compute(&input, &reference, Some(&std), CompareOptions::default()).unwrap();

        assert_eq!(comparison.abserr.rows, vec![vec![1.0, 1.0], vec![1.0, 4.0]]);
        assert_eq!(comparison.relerr.rows, vec![vec![0.0, 1.0], vec![0.5, 0.0]]);
        assert_eq!(
            comparison.stderr.unwrap().rows,
            vec![vec![0.0, 2.0], vec![2.0, 0.0]]
        );
    }

    #[test]
    fn test_scalar_summary_is_time_weighted() {
        let input = Trajectory::new(vec![0.0, 1.0, 3.0], vec![vec![1.0], vec![3.0], vec![3.0]]);
        let reference = Trajectory::new(vec![0.0, 1.0, 3.0], vec![vec![0.0], vec![1.0], vec![1.0]]);
        let comparison =
            Comparison::compute(&input, &reference, None, CompareOptions::default()).unwrap();

        // |err| = 1, 2, 2 integrates to 1.5 + 4 over 3 time units
        assert_eq!(comparison.report.abserr, vec![5.5 / 3.0]);
        assert_eq!(comparison.report.stderr, None);
        assert!(comparison.stderr.is_none());
    }

    #[test]
    fn test_column_selection() {
        let wide = series(vec![vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0]]);
        let narrow = series(vec![vec![0.0, 0.0], vec![0.0, 0.0]]);

        let auto = Comparison::compute(&wide, &narrow, None, CompareOptions::default()).unwrap();
        assert_eq!(auto.columns, 2);
        assert_eq!(auto.abserr.columns(), 2);

        let one = CompareOptions {
            columns: Some(1),
            ..CompareOptions::default()
        };
        assert_eq!(Comparison::compute(&wide, &narrow, None, one).unwrap().report.abserr, vec![1.0]);

        let too_many = CompareOptions {
            columns: Some(3),
            ..CompareOptions::default()
        };
        assert_eq!(
            Comparison::compute(&wide, &narrow, None, too_many),
            Err(StatsError::NotEnoughColumns {
                requested: 3,
                available: 2
            })
        );
    }

    #[test]
    fn test_time_axis_mismatch() {
        let a = series(vec![vec![1.0], vec![2.0], vec![3.0]]);
        let mut b = a.clone();
        b.time[2] = 4.5;
        assert!(matches!(
            Comparison::compute(&a, &b, None, CompareOptions::default()),
            Err(StatsError::TimeAxisMismatch(_))
        ));

        let short = series(vec![vec![1.0], vec![2.0]]);
        assert!(matches!(
            Comparison::compute(&a, &short, None, CompareOptions::default()),
            Err(StatsError::TimeAxisMismatch(_))
        ));
    }

    #[test]
    fn test_reference_std_must_match_reference() {
        let a = series(vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
        let std = series(vec![vec![1.0], vec![2.0]]);
        assert!(matches!(
            Comparison::compute(&a, &a, Some(&std), CompareOptions::default()),
            Err(StatsError::InvalidReferenceStd(_))
        ));
    }

    #[test]
    fn test_skip_and_degenerate_axis() {
        let a = series(vec![vec![9.0], vec![1.0], vec![2.0]]);
        let b = series(vec![vec![0.0], vec![1.0], vec![2.0]]);
        let skipped = CompareOptions {
            skip: 1,
            ..CompareOptions::default()
        };
        let comparison = Comparison::compute(&a, &b, None, skipped).unwrap();
        assert_eq!(comparison.abserr.time, vec![2.0, 4.0]);
        assert_eq!(comparison.report.abserr, vec![0.0]);

        let all_but_one = CompareOptions {
            skip: 2,
            ..CompareOptions::default()
        };
        assert_eq!(
            Comparison::compute(&a, &b, None, all_but_one),
            Err(StatsError::DegenerateTimeAxis)
        );
    }
}
