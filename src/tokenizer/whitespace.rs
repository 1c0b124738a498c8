use nom::{bytes::complete::take_while1, combinator::map, error::context};

use super::token::{ParserResult, Token};

/// Parses a run of spaces, tabs or line breaks into a single whitespace token.
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_whitespace(input: &str) -> ParserResult<Token> {
    context(
        "whitespace",
        map(take_while1(|c: char| c.is_whitespace()), |s: &str| {
            Token::Whitespace(s.to_string())
        }),
    )(input)
}
