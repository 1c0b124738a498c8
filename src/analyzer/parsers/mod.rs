//! Token-level parsers shared by the expression grammar.

pub mod expression;

use super::{core::*, prelude::*};
use crate::ast;
use crate::tokenizer::{
    literal::Literal,
    symbol::{Delimiter, Operator},
    token::Token,
};

pub fn parse_identifier() -> impl Parser<Token, String> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Identifier(name) => Some(name.clone()),
            _ => None,
        }),
        "identifier",
    )
}

pub fn parse_number() -> impl Parser<Token, ast::Literal> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Literal(Literal::Integer(i)) => Some(ast::Literal::Integer(*i)),
            Token::Literal(Literal::Float(x)) => Some(ast::Literal::Float(*x)),
            _ => None,
        }),
        "number",
    )
}

pub fn parse_open_paren() -> impl Parser<Token, Token> {
    with_context(equal(Token::Delimiter(Delimiter::OpenParen)), "open paren")
}

pub fn parse_close_paren() -> impl Parser<Token, Token> {
    with_context(equal(Token::Delimiter(Delimiter::CloseParen)), "close paren")
}

pub fn parse_comma() -> impl Parser<Token, Token> {
    with_context(equal(Token::Delimiter(Delimiter::Comma)), "comma")
}

pub fn parse_operator(operator: Operator) -> impl Parser<Token, Token> {
    equal(Token::Operator(operator))
}
