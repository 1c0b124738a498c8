use std::fmt;

use nom::{
    branch::alt,
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, map_res, opt, recognize},
    error::context,
    sequence::tuple,
};

use super::token::{ParserResult, Token};

/// Numeric literal. Signs are not part of the literal; the parser treats them
/// as unary operators.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
        }
    }
}

fn exponent(input: &str) -> ParserResult<&str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_float_literal(input: &str) -> ParserResult<Literal> {
    context(
        "float literal",
        map_res(
            alt((
                // 1.5, 2., 1.5e3
                recognize(tuple((digit1, char('.'), digit0, opt(exponent)))),
                // .5, .5e-1
                recognize(tuple((char('.'), digit1, opt(exponent)))),
                // 1e-3
                recognize(tuple((digit1, exponent))),
            )),
            |s: &str| s.parse::<f64>().map(Literal::Float),
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_integer_literal(input: &str) -> ParserResult<Literal> {
    context(
        "integer literal",
        map_res(digit1, |s: &str| s.parse::<i64>().map(Literal::Integer)),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_literal(input: &str) -> ParserResult<Token> {
    context(
        "literal",
        map(
            alt((parse_float_literal, parse_integer_literal)),
            Token::Literal,
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_literal() {
        let (rest, token) = parse_literal("1000 rest").unwrap();
        assert_eq!(token, Token::Literal(Literal::Integer(1000)));
        assert_eq!(rest, " rest");
    }

    #[test]
    fn test_float_literals() {
        let test_cases = [
            ("2.0", 2.0),
            ("0.033", 0.033),
            ("2.", 2.0),
            (".25", 0.25),
            ("1e-3", 0.001),
            ("1.5E2", 150.0),
        ];

        for (input, expected) in test_cases.iter() {
            let (rest, token) = parse_literal(input).unwrap();
            assert_eq!(token, Token::Literal(Literal::Float(*expected)));
            assert_eq!(rest, "");
        }
    }

    #[test]
    fn test_exponent_requires_digits() {
        let (rest, token) = parse_literal("2e").unwrap();
        assert_eq!(token, Token::Literal(Literal::Integer(2)));
        assert_eq!(rest, "e");
    }
}
