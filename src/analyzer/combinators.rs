//! # Parser Combinators
//!
//! Building blocks composed into the expression grammar.
//!
//! * **Basic**: `Equal`, `Satisfy`
//! * **Sequential**: `Tuple2`, `Preceded`, `Delimited`
//! * **Alternative**: `Choice`, `Optional`
//! * **Repetition**: `Many`, `SeparatedList`
//! * **Transformation**: `Map`, `AsUnit`
//! * **Support**: `WithContext`, `Lazy`

use super::core::{ParseError, ParseResult, Parser};
use std::fmt;
use std::marker::PhantomData;

/// Equal: matches one specific token and consumes it.
#[derive(Clone)]
pub struct Equal<I> {
    value: I,
}

impl<I> Equal<I> {
    pub fn new(value: I) -> Self {
        Self { value }
    }
}

impl<I: Clone + PartialEq + fmt::Display> Parser<I, I> for Equal<I> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<I> {
        match input.get(pos) {
            Some(found) if *found == self.value => Ok((pos + 1, found.clone())),
            Some(found) => Err(ParseError::Unexpected {
                expected: self.value.to_string(),
                parsed: found.to_string(),
                position: pos,
                context: None,
            }),
            None => Err(ParseError::UnexpectedEOF {
                message: format!("expected {}", self.value),
                position: pos,
                context: None,
            }),
        }
    }
}

/// Satisfy: consumes one token when the predicate maps it to a value.
#[derive(Clone)]
pub struct Satisfy<I, O, F> {
    f: F,
    _phantom: PhantomData<(I, O)>,
}

impl<I, O, F> Satisfy<I, O, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, F> Parser<I, O> for Satisfy<I, O, F>
where
    I: fmt::Display,
    F: Fn(&I) -> Option<O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        match input.get(pos) {
            Some(found) => match (self.f)(found) {
                Some(value) => Ok((pos + 1, value)),
                None => Err(ParseError::Failure {
                    message: format!("unexpected token {}", found),
                    position: pos,
                    context: None,
                }),
            },
            None => Err(ParseError::UnexpectedEOF {
                message: "unexpected end of input".to_string(),
                position: pos,
                context: None,
            }),
        }
    }
}

/// Choice: tries each parser in order and returns the first success.
pub struct Choice<I, O> {
    parsers: Vec<Box<dyn Parser<I, O>>>,
}

impl<I, O> Choice<I, O> {
    pub fn new(parsers: Vec<Box<dyn Parser<I, O>>>) -> Self {
        Self { parsers }
    }
}

impl<I, O> Parser<I, O> for Choice<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        for parser in &self.parsers {
            if let Ok(result) = parser.parse(input, pos) {
                return Ok(result);
            }
        }
        Err(ParseError::NoAlternative {
            position: pos,
            context: None,
        })
    }
}

/// Preceded: runs both parsers and keeps only the second output.
#[derive(Clone)]
pub struct Preceded<P1, P2, I, O1, O2> {
    parser1: P1,
    parser2: P2,
    _phantom: PhantomData<(I, O1, O2)>,
}

impl<P1, P2, I, O1, O2> Preceded<P1, P2, I, O1, O2> {
    pub fn new(parser1: P1, parser2: P2) -> Self {
        Self {
            parser1,
            parser2,
            _phantom: PhantomData,
        }
    }
}

impl<P1, P2, I, O1, O2> Parser<I, O2> for Preceded<P1, P2, I, O1, O2>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O2> {
        let (pos, _) = self.parser1.parse(input, pos)?;
        self.parser2.parse(input, pos)
    }
}

/// Map: transforms the output of a parser.
#[derive(Clone)]
pub struct Map<P, F, A, B> {
    parser: P,
    f: F,
    _phantom: PhantomData<(A, B)>,
}

impl<P, F, A, B> Map<P, F, A, B> {
    pub fn new(parser: P, f: F) -> Self {
        Self {
            parser,
            f,
            _phantom: PhantomData,
        }
    }
}

impl<I, A, B, P, F> Parser<I, B> for Map<P, F, A, B>
where
    P: Parser<I, A>,
    F: Fn(A) -> B,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<B> {
        self.parser
            .parse(input, pos)
            .map(|(pos, value)| (pos, (self.f)(value)))
    }
}

/// AsUnit: runs a parser and discards its output.
#[derive(Clone)]
pub struct AsUnit<P, O> {
    parser: P,
    _phantom: PhantomData<O>,
}

impl<P, O> AsUnit<P, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, P, O> Parser<I, ()> for AsUnit<P, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<()> {
        self.parser.parse(input, pos).map(|(pos, _)| (pos, ()))
    }
}

/// Many: applies a parser zero or more times.
///
/// Stops at the first failure and never fails itself. A parser that succeeds
/// without consuming input also stops the loop.
#[derive(Clone)]
pub struct Many<P, I, O> {
    parser: P,
    _phantom: PhantomData<(I, O)>,
}

impl<P, I, O> Many<P, I, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P> Parser<I, Vec<O>> for Many<P, I, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], mut pos: usize) -> ParseResult<Vec<O>> {
        let mut results = Vec::new();
        while let Ok((next_pos, value)) = self.parser.parse(input, pos) {
            if next_pos == pos {
                break;
            }
            results.push(value);
            pos = next_pos;
        }
        Ok((pos, results))
    }
}

/// SeparatedList: zero or more items separated by a separator.
///
/// A trailing separator is not consumed.
#[derive(Clone)]
pub struct SeparatedList<P, S, I, O> {
    item_parser: P,
    separator_parser: S,
    _phantom: PhantomData<(I, O)>,
}

impl<P, S, I, O> SeparatedList<P, S, I, O> {
    pub fn new(item_parser: P, separator_parser: S) -> Self {
        Self {
            item_parser,
            separator_parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P, S> Parser<I, Vec<O>> for SeparatedList<P, S, I, O>
where
    P: Parser<I, O>,
    S: Parser<I, ()>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Vec<O>> {
        let mut results = Vec::new();
        let mut current_pos = match self.item_parser.parse(input, pos) {
            Ok((next_pos, first)) => {
                results.push(first);
                next_pos
            }
            Err(_) => return Ok((pos, results)),
        };

        loop {
            let Ok((after_separator, _)) = self.separator_parser.parse(input, current_pos) else {
                break;
            };
            match self.item_parser.parse(input, after_separator) {
                Ok((next_pos, item)) => {
                    results.push(item);
                    current_pos = next_pos;
                }
                Err(_) => break,
            }
        }

        Ok((current_pos, results))
    }
}

/// Optional: succeeds with `None` when the inner parser fails.
#[derive(Clone)]
pub struct Optional<P, I, O> {
    parser: P,
    _phantom: PhantomData<(I, O)>,
}

impl<P, I, O> Optional<P, I, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P> Parser<I, Option<O>> for Optional<P, I, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Option<O>> {
        match self.parser.parse(input, pos) {
            Ok((next_pos, value)) => Ok((next_pos, Some(value))),
            Err(_) => Ok((pos, None)),
        }
    }
}

#[derive(Clone)]
pub struct Tuple2<P1, P2, I, O1, O2> {
    parser1: P1,
    parser2: P2,
    _phantom: PhantomData<(I, O1, O2)>,
}

impl<P1, P2, I, O1, O2> Tuple2<P1, P2, I, O1, O2> {
    pub fn new(parser1: P1, parser2: P2) -> Self {
        Self {
            parser1,
            parser2,
            _phantom: PhantomData,
        }
    }
}

impl<P1, P2, I, O1, O2> Parser<I, (O1, O2)> for Tuple2<P1, P2, I, O1, O2>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O1, O2)> {
        let (pos, o1) = self.parser1.parse(input, pos)?;
        let (pos, o2) = self.parser2.parse(input, pos)?;
        Ok((pos, (o1, o2)))
    }
}

/// Delimited: parses `left parser right` and keeps the middle output.
#[derive(Clone)]
pub struct Delimited<L, P, R, I, O> {
    left: L,
    parser: P,
    right: R,
    _phantom: PhantomData<(I, O)>,
}

impl<L, P, R, I, O> Delimited<L, P, R, I, O> {
    pub fn new(left: L, parser: P, right: R) -> Self {
        Self {
            left,
            parser,
            right,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, L, P, R> Parser<I, O> for Delimited<L, P, R, I, O>
where
    L: Parser<I, ()>,
    P: Parser<I, O>,
    R: Parser<I, ()>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let (pos, _) = self.left.parse(input, pos)?;
        let (pos, value) = self.parser.parse(input, pos)?;
        let (pos, _) = self.right.parse(input, pos)?;
        Ok((pos, value))
    }
}

/// WithContext: labels errors with the grammar rule that produced them.
#[derive(Clone)]
pub struct WithContext<P, C> {
    parser: P,
    context: C,
}

impl<P, C> WithContext<P, C> {
    pub fn new(parser: P, context: C) -> Self {
        Self { parser, context }
    }
}

impl<I, O, P, C: ToString> Parser<I, O> for WithContext<P, C>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        self.parser
            .parse(input, pos)
            .map_err(|e| e.with_context(&self.context.to_string()))
    }
}

/// Lazy: builds the inner parser on each call, enabling recursive grammars.
#[derive(Clone)]
pub struct Lazy<F> {
    f: F,
}

impl<F> Lazy<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<I, O, F, P> Parser<I, O> for Lazy<F>
where
    F: Fn() -> P,
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        (self.f)().parse(input, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digit() -> impl Parser<char, u32> {
        Satisfy::new(|c: &char| c.to_digit(10))
    }

    #[test]
    fn test_equal() {
        let input = vec!['a', 'b'];
        let parser = Equal::new('a');
        assert_eq!(parser.parse(&input, 0), Ok((1, 'a')));
        assert!(matches!(
            parser.parse(&input, 1),
            Err(ParseError::Unexpected { position: 1, .. })
        ));
        assert!(matches!(
            parser.parse(&input, 2),
            Err(ParseError::UnexpectedEOF { position: 2, .. })
        ));
    }

    #[test]
    fn test_choice() {
        let input = vec!['b'];
        let parser = Choice::new(vec![Box::new(Equal::new('a')), Box::new(Equal::new('b'))]);
        assert_eq!(parser.parse(&input, 0), Ok((1, 'b')));

        let input = vec!['c'];
        assert!(matches!(
            parser.parse(&input, 0),
            Err(ParseError::NoAlternative { position: 0, .. })
        ));
    }

    #[test]
    fn test_many_and_map() {
        let input: Vec<char> = "123x".chars().collect();
        let parser = Map::new(Many::new(digit()), |digits: Vec<u32>| {
            digits.iter().fold(0, |acc, d| acc * 10 + d)
        });
        assert_eq!(parser.parse(&input, 0), Ok((3, 123)));
    }

    #[test]
    fn test_separated_list() {
        let input: Vec<char> = "1,2,3,".chars().collect();
        let parser = SeparatedList::new(digit(), AsUnit::new(Equal::new(',')));
        // trailing separator stays unconsumed
        assert_eq!(parser.parse(&input, 0), Ok((5, vec![1, 2, 3])));

        let empty: Vec<char> = vec![')'];
        assert_eq!(parser.parse(&empty, 0), Ok((0, vec![])));
    }

    #[test]
    fn test_delimited_and_preceded() {
        let input: Vec<char> = "(-7)".chars().collect();
        let parser = Delimited::new(
            AsUnit::new(Equal::new('(')),
            Preceded::new(Equal::new('-'), digit()),
            AsUnit::new(Equal::new(')')),
        );
        assert_eq!(parser.parse(&input, 0), Ok((4, 7)));
    }

    #[test]
    fn test_optional() {
        let input = vec!['x'];
        let parser = Optional::new(digit());
        assert_eq!(parser.parse(&input, 0), Ok((0, None)));
    }

    #[test]
    fn test_with_context_chains_labels() {
        let input = vec!['x'];
        let parser = WithContext::new(WithContext::new(Equal::new('a'), "inner"), "outer");
        match parser.parse(&input, 0) {
            Err(ParseError::Unexpected { context, .. }) => {
                assert_eq!(context, Some("inner -> outer".to_string()))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
