//! # Expression Analyzer
//!
//! Parses the significant tokens of a parameter expression into an
//! [`ast::Expression`] with a small parser-combinator library.
//!
//! ```text
//! expression text → Tokenizer → Analyzer → ast::Expression → ExpressionEvaluator
//! ```
//!
//! ## Usage Example
//!
//! ```ignore
//! use ptti::analyzer::parse_tokens;
//! use ptti::tokenizer::Tokenizer;
//!
//! let tokens = Tokenizer::new().tokenize_significant("beta * c / N")?;
//! let expression = parse_tokens(&tokens)?;
//! ```

pub mod combinators;
pub mod core;
pub mod parsers;
pub mod prelude;

pub use core::ParseError;
pub use core::ParseResult;
pub use core::Parser;

pub use crate::ast;

use crate::tokenizer::token::Token;

/// Parses a complete expression. Tokens left over after the expression are
/// an error.
pub fn parse_tokens(tokens: &[Token]) -> Result<ast::Expression, ParseError> {
    let (pos, expression) = parsers::expression::parse_expression().parse(tokens, 0)?;
    match tokens.get(pos) {
        None => Ok(expression),
        Some(token) => Err(ParseError::Unexpected {
            expected: "end of expression".to_string(),
            parsed: token.to_string(),
            position: pos,
            context: None,
        }),
    }
}
