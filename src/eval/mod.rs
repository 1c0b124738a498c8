//! # Expression Evaluation
//!
//! Evaluates parsed parameter expressions against a [`context::Namespace`].
//!
//! Evaluation is deliberately closed: names resolve only to namespace bindings
//! or the constants `pi`, `e`, `inf` and `nan`, and calls resolve only to the
//! math allowlist in [`expression`] or the sampling functions in
//! [`distributions`]. There is no attribute access, indexing or import.

pub mod context;
pub mod distributions;
pub mod expression;

use thiserror::Error;

use crate::analyzer::ParseError;
use crate::tokenizer::TokenizerError;

pub use context::Namespace;
pub use expression::{ExpressionEvaluator, Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Undefined name: {0}")]
    UndefinedName(String),
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("{function}() takes {expected} arguments ({found} given)")]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },
    #[error("Invalid argument to {function}(): {message}")]
    InvalidArgument { function: String, message: String },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow in {0}")]
    Overflow(String),
    #[error("Tokenize error: {0}")]
    Tokenize(#[from] TokenizerError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

pub type EvalResult<T> = Result<T, EvalError>;
