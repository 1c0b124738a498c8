//! Effective reproduction number R(t) of a trajectory.
//!
//! Computed as a renewal-kernel integral over the infectious pressure on the
//! unconfined susceptibles, allowing `beta` and `c` to vary piecewise along
//! the trajectory.

use crate::stats::trapezoid;

/// Column sets the computation reads, as indices into a trajectory row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReproductionColumns {
    /// Compartments that together make up the population.
    pub population: Vec<usize>,
    /// Susceptibles exposed to infection.
    pub susceptible: Vec<usize>,
    /// Infectious individuals able to infect.
    pub active_infectious: Vec<usize>,
    /// All infectious individuals.
    pub infectious: Vec<usize>,
}

fn column_sum(row: &[f64], columns: &[usize]) -> f64 {
    columns.iter().map(|&c| row[c]).sum()
}

/// Returns R at every time of `time`.
///
/// `beta` and `c` hold the value in force at each row. For row `i` the
/// pressure series is left-padded with its first value so that the kernel
/// `exp(-gamma t)` is applied in reverse against the history up to `i`.
pub fn reproduction_series(
    time: &[f64],
    rows: &[Vec<f64>],
    beta: &[f64],
    c: &[f64],
    gamma: f64,
    columns: &ReproductionColumns,
) -> Vec<f64> {
    let n = time.len();
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let population = column_sum(first, &columns.population);

    let pressure: Vec<f64> = rows
        .iter()
        .zip(beta.iter().zip(c))
        .map(|(row, (beta, c))| {
            let infectious = column_sum(row, &columns.infectious);
            let exposed = if infectious != 0.0 {
                column_sum(row, &columns.susceptible) * column_sum(row, &columns.active_infectious)
                    / infectious
            } else {
                0.0
            };
            beta * c * exposed
        })
        .collect();

    let kernel: Vec<f64> = time.iter().rev().map(|t| (-gamma * t).exp()).collect();

    let mut integrand = vec![0.0; n];
    (0..n)
        .map(|i| {
            let pad = n - i - 1;
            for (j, value) in integrand.iter_mut().enumerate() {
                let s = if j < pad { pressure[0] } else { pressure[j - pad] };
                *value = s * kernel[j] / population;
            }
            trapezoid(&integrand, time)
        })
        .collect()
}
