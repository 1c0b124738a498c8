//! # Expression Tokenizer
//!
//! Turns the text of an expression-valued parameter (`"beta * c / N"`,
//! `"normal(0.5, 0.1)"`) into a stream of [`token::Token`]s for the
//! [`crate::analyzer`].
//!
//! Only numbers, identifiers, arithmetic operators, parentheses and commas are
//! recognized. Anything else (attribute access, indexing, strings, statements)
//! is rejected here, before parsing, so configuration text can never reach
//! general-purpose evaluation.

pub mod literal;
pub mod symbol;
pub mod token;
pub mod whitespace;

pub use token::{Token, TokenSpan, Tokenizer, TokenizerError, TokenizerResult};
