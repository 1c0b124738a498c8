//! Trajectory files and output naming.
//!
//! Trajectories are stored as tab-separated text, one row per time with the
//! time in the first column. Cells use 18 significant decimals in scientific
//! notation with a signed, two-digit exponent (`1.000000000000000000e+00`).

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::config::ConfigError;
use crate::model::Trajectory;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },
    #[error("Trajectory has {rows} rows for {times} times")]
    Ragged { rows: usize, times: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type OutputResult<T> = Result<T, OutputError>;

pub fn format_cell(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let formatted = format!("{:.18e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => formatted,
    }
}

pub fn to_tsv(trajectory: &Trajectory) -> OutputResult<String> {
    if !trajectory.is_rectangular() {
        return Err(OutputError::Ragged {
            rows: trajectory.rows.len(),
            times: trajectory.time.len(),
        });
    }
    let mut text = String::new();
    for (time, row) in trajectory.time.iter().zip(&trajectory.rows) {
        let cells: Vec<String> = std::iter::once(time)
            .chain(row)
            .map(|v| format_cell(*v))
            .collect();
        text.push_str(&cells.join("\t"));
        text.push('\n');
    }
    Ok(text)
}

pub fn write_tsv<P: AsRef<Path>>(path: P, trajectory: &Trajectory) -> OutputResult<()> {
    let path = path.as_ref();
    let text = to_tsv(trajectory)?;
    debug!("Writing {} rows to {}", trajectory.len(), path.display());
    fs::write(path, text).map_err(|source| OutputError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parses whitespace-separated rows, skipping blank lines and `#` comments.
pub fn parse_tsv(text: &str, path: &str) -> OutputResult<Trajectory> {
    let mut trajectory = Trajectory::default();
    let mut width = None;

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let error = |message: String| OutputError::Parse {
            path: path.to_string(),
            line: number + 1,
            message,
        };
        let values = line
            .split_whitespace()
            .map(|cell| {
                cell.parse::<f64>()
                    .map_err(|e| error(format!("{:?}: {}", cell, e)))
            })
            .collect::<OutputResult<Vec<f64>>>()?;

        match width {
            None => width = Some(values.len()),
            Some(width) if width != values.len() => {
                return Err(error(format!(
                    "expected {} columns, found {}",
                    width,
                    values.len()
                )))
            }
            Some(_) => {}
        }

        let mut values = values.into_iter();
        if let Some(time) = values.next() {
            trajectory.time.push(time);
            trajectory.rows.push(values.collect());
        }
    }
    Ok(trajectory)
}

pub fn read_tsv<P: AsRef<Path>>(path: P) -> OutputResult<Trajectory> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| OutputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_tsv(&text, &path.display().to_string())
}

/// `{output}-{index}.tsv` and `{output}-{index}.yaml`.
pub fn sample_paths(output: &str, index: usize) -> (PathBuf, PathBuf) {
    (
        PathBuf::from(format!("{}-{}.tsv", output, index)),
        PathBuf::from(format!("{}-{}.yaml", output, index)),
    )
}

/// `{output}-avg.tsv` and `{output}-std.tsv`.
pub fn aggregate_paths(output: &str) -> (PathBuf, PathBuf) {
    (
        PathBuf::from(format!("{}-avg.tsv", output)),
        PathBuf::from(format!("{}-std.tsv", output)),
    )
}

/// Output base of a comparison: the input path without its extension.
pub fn comparison_base<P: AsRef<Path>>(input: P) -> String {
    input.as_ref().with_extension("").display().to_string()
}
