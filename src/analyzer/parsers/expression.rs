//! Grammar of parameter expressions, lowest precedence first:
//!
//! ```text
//! expression     := additive
//! additive       := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := unary (('*' | '/' | '//' | '%') unary)*
//! unary          := ('-' | '+') unary | power
//! power          := primary ('**' unary)?
//! primary        := call | number | identifier | '(' expression ')'
//! call           := identifier '(' (expression (',' expression)*)? ')'
//! ```
//!
//! `**` binds tighter than a unary sign on its left and is right associative,
//! so `-2 ** 2` is `-(2 ** 2)` and `2 ** 3 ** 2` is `2 ** (3 ** 2)`.

use super::{super::core::*, super::prelude::*, *};
use crate::ast;
use crate::tokenizer::{symbol::Operator, token::Token};

pub fn parse_expression() -> impl Parser<Token, ast::Expression> {
    with_context(parse_additive(), "expression")
}

fn fold_binary(
    (first, rest): (ast::Expression, Vec<(ast::BinaryOperator, ast::Expression)>),
) -> ast::Expression {
    rest.into_iter()
        .fold(first, |left, (op, right)| ast::Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
}

fn parse_additive() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_multiplicative(),
                many(tuple2(
                    choice(vec![
                        Box::new(binary_operator(Operator::Plus, ast::BinaryOperator::Add)),
                        Box::new(binary_operator(
                            Operator::Minus,
                            ast::BinaryOperator::Subtract,
                        )),
                    ]),
                    parse_multiplicative(),
                )),
            ),
            fold_binary,
        ),
        "additive",
    )
}

fn parse_multiplicative() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                lazy(parse_unary),
                many(tuple2(
                    choice(vec![
                        Box::new(binary_operator(
                            Operator::Multiply,
                            ast::BinaryOperator::Multiply,
                        )),
                        Box::new(binary_operator(Operator::Divide, ast::BinaryOperator::Divide)),
                        Box::new(binary_operator(
                            Operator::FloorDivide,
                            ast::BinaryOperator::FloorDivide,
                        )),
                        Box::new(binary_operator(Operator::Modulo, ast::BinaryOperator::Modulo)),
                    ]),
                    lazy(parse_unary),
                )),
            ),
            fold_binary,
        ),
        "multiplicative",
    )
}

fn binary_operator(
    operator: Operator,
    op: ast::BinaryOperator,
) -> impl Parser<Token, ast::BinaryOperator> {
    map(parse_operator(operator), move |_| op)
}

// Boxed so the grammar can recurse through it.
fn parse_unary() -> Box<dyn Parser<Token, ast::Expression>> {
    Box::new(with_context(
        choice(vec![
            Box::new(map(
                tuple2(
                    choice(vec![
                        Box::new(map(parse_operator(Operator::Minus), |_| {
                            ast::UnaryOperator::Negate
                        })),
                        Box::new(map(parse_operator(Operator::Plus), |_| {
                            ast::UnaryOperator::Plus
                        })),
                    ]),
                    lazy(parse_unary),
                ),
                |(op, operand)| ast::Expression::UnaryOp {
                    op,
                    operand: Box::new(operand),
                },
            )),
            Box::new(parse_power()),
        ]),
        "unary",
    ))
}

fn parse_power() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_primary(),
                optional(preceded(
                    as_unit(parse_operator(Operator::Power)),
                    lazy(parse_unary),
                )),
            ),
            |(base, exponent)| match exponent {
                Some(exponent) => ast::Expression::BinaryOp {
                    op: ast::BinaryOperator::Power,
                    left: Box::new(base),
                    right: Box::new(exponent),
                },
                None => base,
            },
        ),
        "power",
    )
}

fn parse_primary() -> Box<dyn Parser<Token, ast::Expression>> {
    Box::new(with_context(
        choice(vec![
            Box::new(parse_function_call()),
            Box::new(map(parse_number(), ast::Expression::Literal)),
            Box::new(map(parse_identifier(), ast::Expression::Variable)),
            Box::new(delimited(
                as_unit(parse_open_paren()),
                lazy(parse_expression_boxed),
                as_unit(parse_close_paren()),
            )),
        ]),
        "primary",
    ))
}

fn parse_expression_boxed() -> Box<dyn Parser<Token, ast::Expression>> {
    Box::new(parse_expression())
}

fn parse_function_call() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_identifier(),
                delimited(
                    as_unit(parse_open_paren()),
                    separated_list(lazy(parse_expression_boxed), as_unit(parse_comma())),
                    as_unit(parse_close_paren()),
                ),
            ),
            |(function, arguments)| ast::Expression::FunctionCall {
                function,
                arguments,
            },
        ),
        "function call",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parse_tokens;
    use crate::ast::{BinaryOperator, Expression, Literal, UnaryOperator};
    use crate::tokenizer::Tokenizer;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Expression {
        let tokens = Tokenizer::new().tokenize_significant(source).unwrap();
        parse_tokens(&tokens).unwrap()
    }

    fn var(name: &str) -> Box<Expression> {
        Box::new(Expression::Variable(name.to_string()))
    }

    fn int(i: i64) -> Box<Expression> {
        Box::new(Expression::Literal(Literal::Integer(i)))
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse("a + b * 3"),
            Expression::BinaryOp {
                op: BinaryOperator::Add,
                left: var("a"),
                right: Box::new(Expression::BinaryOp {
                    op: BinaryOperator::Multiply,
                    left: var("b"),
                    right: int(3),
                }),
            }
        );
    }

    #[test]
    fn test_left_associative_subtraction() {
        assert_eq!(
            parse("a - b - c"),
            Expression::BinaryOp {
                op: BinaryOperator::Subtract,
                left: Box::new(Expression::BinaryOp {
                    op: BinaryOperator::Subtract,
                    left: var("a"),
                    right: var("b"),
                }),
                right: var("c"),
            }
        );
    }

    #[test]
    fn test_power_binds_tighter_than_negation() {
        assert_eq!(
            parse("-2 ** 2"),
            Expression::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(Expression::BinaryOp {
                    op: BinaryOperator::Power,
                    left: int(2),
                    right: int(2),
                }),
            }
        );
    }

    #[test]
    fn test_power_is_right_associative() {
        assert_eq!(
            parse("2 ** 3 ** 2"),
            Expression::BinaryOp {
                op: BinaryOperator::Power,
                left: int(2),
                right: Box::new(Expression::BinaryOp {
                    op: BinaryOperator::Power,
                    left: int(3),
                    right: int(2),
                }),
            }
        );
    }

    #[test]
    fn test_function_call_and_parentheses() {
        assert_eq!(
            parse("max(0, (a + 1)) // 2"),
            Expression::BinaryOp {
                op: BinaryOperator::FloorDivide,
                left: Box::new(Expression::FunctionCall {
                    function: "max".to_string(),
                    arguments: vec![
                        Expression::Literal(Literal::Integer(0)),
                        Expression::BinaryOp {
                            op: BinaryOperator::Add,
                            left: var("a"),
                            right: int(1),
                        },
                    ],
                }),
                right: int(2),
            }
        );
    }

    #[test]
    fn test_rejects_trailing_tokens() {
        let tokens = Tokenizer::new().tokenize_significant("a b").unwrap();
        assert!(parse_tokens(&tokens).is_err());

        let tokens = Tokenizer::new().tokenize_significant("(a + 1").unwrap();
        assert!(parse_tokens(&tokens).is_err());

        let tokens = Tokenizer::new().tokenize_significant("f(1,)").unwrap();
        assert!(parse_tokens(&tokens).is_err());
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(parse_tokens(&[]).is_err());
    }
}
