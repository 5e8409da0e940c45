//! Tokenizer and parsers for the restricted binding grammar.
//!
//! Three small grammars share one lexer: binding expressions, the
//! `<item> in <list>` clause of list expansion and the statements an event
//! handler may run. Anything the grammars do not describe is a
//! [`SyntaxError`], which is how untrusted markup gets rejected.

use chumsky::{
    input::{Stream, ValueInput},
    prelude::*,
};
use std::fmt;
use std::ops::Range;

mod lexer;
pub use lexer::{Token, lexer};

mod expression;
pub use expression::*;

pub use chumsky::prelude::{Input, Parser};

pub type Span = SimpleSpan;
pub type ParseError<'code, T> = Rich<'code, T, Span>;

type Extra<'code> = extra::Err<ParseError<'code, Token<'code>>>;

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

pub fn span_at(offset: usize) -> Span {
    Span::from(offset..offset)
}

/// Why a piece of markup text was not accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub reason: String,
    pub span: Range<usize>,
}

impl SyntaxError {
    fn from_rich<T: fmt::Display>(error: &ParseError<'_, T>) -> Self {
        Self {
            message: error.to_string(),
            reason: error.reason().to_string(),
            span: error.span().into_range(),
        }
    }

    fn from_errors<T: fmt::Display>(source: &str, errors: Vec<ParseError<'_, T>>) -> Self {
        errors
            .first()
            .map(Self::from_rich)
            .unwrap_or_else(|| Self {
                message: "unrecognized expression".to_string(),
                reason: "unrecognized expression".to_string(),
                span: 0..source.len(),
            })
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for SyntaxError {}

fn tokenize(source: &str) -> Result<Vec<Spanned<Token<'_>>>, SyntaxError> {
    let (tokens, errors) = lexer().parse(source).into_output_errors();
    if !errors.is_empty() {
        return Err(SyntaxError::from_errors(source, errors));
    }
    Ok(tokens.unwrap_or_default())
}

/// Parses a binding expression (`bind`, `show`, `if`, `model`).
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(source)?;
    expression_parser()
        .parse(
            Stream::from_iter(tokens)
                .map(span_at(source.len()), |Spanned { node, span }| (node, span)),
        )
        .into_result()
        .map_err(|errors| SyntaxError::from_errors(source, errors))
}

/// Parses the `<item> in <list>` clause of a list-expansion directive.
pub fn parse_for_clause(source: &str) -> Result<ForClause, SyntaxError> {
    let tokens = tokenize(source)?;
    for_clause_parser()
        .parse(
            Stream::from_iter(tokens)
                .map(span_at(source.len()), |Spanned { node, span }| (node, span)),
        )
        .into_result()
        .map_err(|errors| SyntaxError::from_errors(source, errors))
}

/// Parses the code half of an `event:code` pair.
pub fn parse_event_action(source: &str) -> Result<EventAction, SyntaxError> {
    let tokens = tokenize(source)?;
    event_action_parser()
        .parse(
            Stream::from_iter(tokens)
                .map(span_at(source.len()), |Spanned { node, span }| (node, span)),
        )
        .into_result()
        .map_err(|errors| SyntaxError::from_errors(source, errors))
}

fn identifier<'code, I>() -> impl Parser<'code, I, String, Extra<'code>> + Clone
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    select! { Token::Identifier(identifier) => identifier.to_string() }
}

fn path<'code, I>() -> impl Parser<'code, I, Path, Extra<'code>> + Clone
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    identifier()
        .separated_by(just(Token::Dot))
        .at_least(1)
        .collect::<Vec<_>>()
        .map(Path::new)
}

fn literal<'code, I>() -> impl Parser<'code, I, Literal, Extra<'code>> + Clone
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    select! {
        Token::Text(text) => Literal::Text(text.to_string()),
        Token::Number(number) => Literal::Number(number),
        Token::True => Literal::Bool(true),
        Token::False => Literal::Bool(false),
    }
}

fn operand<'code, I>() -> impl Parser<'code, I, Operand, Extra<'code>> + Clone
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    choice((literal().map(Operand::Literal), path().map(Operand::Path)))
}

fn arithmetic<'code, I>() -> impl Parser<'code, I, Arithmetic, Extra<'code>> + Clone
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    let arithmetic_operator = select! {
        Token::Plus => ArithmeticOp::Add,
        Token::Minus => ArithmeticOp::Subtract,
        Token::Asterisk => ArithmeticOp::Multiply,
        Token::Slash => ArithmeticOp::Divide,
    };
    let number = select! { Token::Number(number) => number };

    path()
        .then(arithmetic_operator)
        .then(number)
        .map(|((path, op), number)| Arithmetic {
            path,
            op,
            number,
            parenthesized: false,
        })
}

fn parenthesized_arithmetic<'code, I>() -> impl Parser<'code, I, Arithmetic, Extra<'code>> + Clone
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    arithmetic()
        .delimited_by(just(Token::BracketRoundOpen), just(Token::BracketRoundClose))
        .map(|arithmetic| Arithmetic {
            parenthesized: true,
            ..arithmetic
        })
}

pub fn expression_parser<'code, I>() -> impl Parser<'code, I, Expr, Extra<'code>>
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    let comparator = select! {
        Token::StrictEqual => CompareOp::StrictEqual,
        Token::StrictNotEqual => CompareOp::StrictNotEqual,
        Token::LooseEqual => CompareOp::LooseEqual,
        Token::LooseNotEqual => CompareOp::LooseNotEqual,
        Token::LessOrEqual => CompareOp::LessOrEqual,
        Token::GreaterOrEqual => CompareOp::GreaterOrEqual,
        Token::Less => CompareOp::Less,
        Token::Greater => CompareOp::Greater,
    };

    let logical_operator = select! {
        Token::And => LogicalOp::And,
        Token::Or => LogicalOp::Or,
    };

    let ternary = path()
        .then_ignore(just(Token::Question))
        .then(literal())
        .then_ignore(just(Token::Colon))
        .then(literal())
        .map(|((condition, then), otherwise)| Expr::Ternary {
            condition,
            then,
            otherwise,
        });

    let comparison = path()
        .then(comparator)
        .then(operand())
        .map(|((left, op), right)| Expr::Compare { left, op, right });

    let concat_part = choice((
        parenthesized_arithmetic().map(ConcatPart::Arithmetic),
        literal().map(ConcatPart::Literal),
        path().map(ConcatPart::Path),
    ));

    let concat = concat_part
        .separated_by(just(Token::Plus))
        .at_least(2)
        .collect::<Vec<_>>()
        .try_map(|parts, span| {
            let has_text = parts
                .iter()
                .any(|part| matches!(part, ConcatPart::Literal(Literal::Text(_))));
            if !has_text {
                return Err(Rich::custom(
                    span,
                    "concatenation needs at least one string literal",
                ));
            }
            let arithmetic_count = parts
                .iter()
                .filter(|part| matches!(part, ConcatPart::Arithmetic(_)))
                .count();
            if arithmetic_count > 1 {
                return Err(Rich::custom(
                    span,
                    "concatenation allows only one parenthesized arithmetic operand",
                ));
            }
            Ok(Expr::Concat(parts))
        });

    let arithmetic_expression =
        choice((parenthesized_arithmetic(), arithmetic())).map(Expr::Arithmetic);

    let negation = just(Token::Bang).ignore_then(path()).map(Expr::Not);

    // Longest shapes first: a bare path is a prefix of almost everything else.
    let simple = choice((
        ternary,
        comparison,
        concat,
        arithmetic_expression,
        negation,
        literal().map(Expr::Literal),
        path().map(Expr::Path),
    ));

    simple
        .clone()
        .then(logical_operator.then(simple).or_not())
        .map(|(left, right)| match right {
            None => left,
            Some((op, right)) => Expr::Logical {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
        })
}

pub fn for_clause_parser<'code, I>() -> impl Parser<'code, I, ForClause, Extra<'code>>
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    let keyword_in = select! { Token::Identifier("in") => () };

    identifier()
        .then_ignore(keyword_in)
        .then(path())
        .map(|(item, list)| ForClause { item, list })
}

pub fn event_action_parser<'code, I>() -> impl Parser<'code, I, EventAction, Extra<'code>>
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    let step = select! {
        Token::Increment => Step::Increment,
        Token::Decrement => Step::Decrement,
    };

    let call = identifier()
        .then_ignore(just(Token::BracketRoundOpen))
        .then_ignore(just(Token::BracketRoundClose))
        .map(EventAction::Call);

    let step = path()
        .then(step)
        .map(|(target, step)| EventAction::Step { target, step });

    let assign = path()
        .then_ignore(just(Token::Assign))
        .then(operand())
        .map(|(target, value)| EventAction::Assign { target, value });

    choice((call, step, assign))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_of(dotted: &str) -> Path {
        Path::new(dotted.split('.'))
    }

    #[test]
    fn test_parses_paths_and_literals() {
        assert_eq!(
            parse_expression("user.address.city"),
            Ok(Expr::Path(path_of("user.address.city")))
        );
        assert_eq!(
            parse_expression("'hello'"),
            Ok(Expr::Literal(Literal::Text("hello".to_string())))
        );
        assert_eq!(
            parse_expression("42.5"),
            Ok(Expr::Literal(Literal::Number(42.5)))
        );
        assert_eq!(
            parse_expression(" true "),
            Ok(Expr::Literal(Literal::Bool(true)))
        );
    }

    #[test]
    fn test_arithmetic_is_not_mistaken_for_concat() {
        assert_eq!(
            parse_expression("count + 1"),
            Ok(Expr::Arithmetic(Arithmetic {
                path: path_of("count"),
                op: ArithmeticOp::Add,
                number: 1.0,
                parenthesized: false,
            }))
        );
        assert!(matches!(
            parse_expression("(price * 2)"),
            Ok(Expr::Arithmetic(Arithmetic {
                parenthesized: true,
                ..
            }))
        ));
    }

    #[test]
    fn test_concat_chain() {
        let Ok(Expr::Concat(parts)) = parse_expression("'Total: ' + (price * 2) + ' ' + unit")
        else {
            panic!("expected concatenation");
        };
        assert_eq!(parts.len(), 4);
        assert!(matches!(parts[1], ConcatPart::Arithmetic(_)));
        assert_eq!(parts[3], ConcatPart::Path(path_of("unit")));
    }

    #[test]
    fn test_comparison_logical_and_ternary() {
        assert!(matches!(
            parse_expression("status === 'done'"),
            Ok(Expr::Compare {
                op: CompareOp::StrictEqual,
                right: Operand::Literal(Literal::Text(_)),
                ..
            })
        ));
        assert!(matches!(
            parse_expression("a.b >= limit"),
            Ok(Expr::Compare {
                op: CompareOp::GreaterOrEqual,
                right: Operand::Path(_),
                ..
            })
        ));
        assert!(matches!(
            parse_expression("!loading && count > 0"),
            Ok(Expr::Logical {
                op: LogicalOp::And,
                ..
            })
        ));
        assert!(matches!(
            parse_expression("active ? 'on' : 'off'"),
            Ok(Expr::Ternary { .. })
        ));
    }

    #[test]
    fn test_rejects_shapes_outside_grammar() {
        for source in [
            "",
            "alert(1)",
            "a = 1",
            "a.b()",
            "a + b",
            "1 + count",
            "a && b && c",
            "a === b === c",
            "!(a)",
            "x ? y : z",
            "'a' + (b * 2) + (c * 3)",
            "count - -1",
        ] {
            assert!(parse_expression(source).is_err(), "{source:?} should be rejected");
        }
    }

    #[test]
    fn test_for_clause() {
        assert_eq!(
            parse_for_clause(" todo in state.todos "),
            Ok(ForClause {
                item: "todo".to_string(),
                list: path_of("state.todos"),
            })
        );
        assert!(parse_for_clause("todo of todos").is_err());
        assert!(parse_for_clause("in items").is_err());
    }

    #[test]
    fn test_event_actions() {
        assert_eq!(
            parse_event_action("toggle()"),
            Ok(EventAction::Call("toggle".to_string()))
        );
        assert_eq!(
            parse_event_action("counter++"),
            Ok(EventAction::Step {
                target: path_of("counter"),
                step: Step::Increment,
            })
        );
        assert_eq!(
            parse_event_action("filter = 'all'"),
            Ok(EventAction::Assign {
                target: path_of("filter"),
                value: Operand::Literal(Literal::Text("all".to_string())),
            })
        );
        assert!(parse_event_action("toggle(1)").is_err());
        assert!(parse_event_action("a = b = c").is_err());
        assert!(parse_event_action("counter += 1").is_err());
    }
}
