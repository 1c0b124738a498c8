use thiserror::Error;

use crate::config::ConfigError;
use crate::eval::EvalError;
use crate::model::ModelError;
use crate::output::OutputError;
use crate::resolver::ResolveError;
use crate::runtime::RuntimeError;
use crate::stats::StatsError;

/// Exit status for an unknown model identifier.
pub const EXIT_UNKNOWN_MODEL: i32 = 255;
/// Exit status when distributed execution is requested but unavailable.
pub const EXIT_DISTRIBUTED_UNAVAILABLE: i32 = 254;
/// Exit status for any other fatal error.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Error, Debug)]
pub enum PttiError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("Eval error: {0}")]
    Eval(#[from] EvalError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),
    #[error("Output error: {0}")]
    Output(#[from] OutputError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PttiResult<T> = Result<T, PttiError>;

impl PttiError {
    pub fn exit_code(&self) -> i32 {
        match self {
            PttiError::Resolve(ResolveError::UnknownModel(_))
            | PttiError::Model(ModelError::UnknownModel(_)) => EXIT_UNKNOWN_MODEL,
            PttiError::Runtime(RuntimeError::DistributedUnavailable(_)) => {
                EXIT_DISTRIBUTED_UNAVAILABLE
            }
            _ => EXIT_FAILURE,
        }
    }
}
