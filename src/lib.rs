//! # ptti
//!
//! Runs epidemic simulations many times under parametrically varying
//! configurations, then aggregates and compares the resulting time series.
//!
//! A run goes through these stages:
//!
//! 1. [`config`] loads an order-preserving YAML document.
//! 2. [`resolver`] evaluates its expressions for one sample index, using the
//!    [`tokenizer`], [`analyzer`] and [`eval`] layers.
//! 3. [`sample`] expands the document into indexed samples.
//! 4. [`runtime`] schedules the samples over the [`model`] collaborator
//!    sequentially, on a local pool, or across distributed workers.
//! 5. [`output`] writes the trajectories, and [`stats`] aggregates or
//!    compares them.
//!
//! [`system`] ties the stages together for the binaries.

pub mod analyzer;
pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod model;
pub mod output;
pub mod resolver;
pub mod runtime;
pub mod sample;
pub mod stats;
pub mod system;
pub mod tokenizer;

pub use error::{PttiError, PttiResult};

#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
