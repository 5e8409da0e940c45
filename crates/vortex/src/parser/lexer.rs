use super::{ParseError, Spanned};
use chumsky::prelude::*;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'code> {
    BracketRoundOpen,
    BracketRoundClose,
    Number(f64),
    Text(&'code str),
    Identifier(&'code str),
    True,
    False,
    Dot,
    Colon,
    Question,
    Bang,
    Assign,
    StrictEqual,
    StrictNotEqual,
    LooseEqual,
    LooseNotEqual,
    LessOrEqual,
    GreaterOrEqual,
    Less,
    Greater,
    And,
    Or,
    Increment,
    Decrement,
    Plus,
    Minus,
    Asterisk,
    Slash,
}

impl<'code> Token<'code> {
    pub fn into_cow_str(self) -> Cow<'code, str> {
        match self {
            Self::BracketRoundOpen => "(".into(),
            Self::BracketRoundClose => ")".into(),
            Self::Number(number) => number.to_string().into(),
            Self::Text(text) => format!("'{text}'").into(),
            Self::Identifier(identifier) => identifier.into(),
            Self::True => "true".into(),
            Self::False => "false".into(),
            Self::Dot => ".".into(),
            Self::Colon => ":".into(),
            Self::Question => "?".into(),
            Self::Bang => "!".into(),
            Self::Assign => "=".into(),
            Self::StrictEqual => "===".into(),
            Self::StrictNotEqual => "!==".into(),
            Self::LooseEqual => "==".into(),
            Self::LooseNotEqual => "!=".into(),
            Self::LessOrEqual => "<=".into(),
            Self::GreaterOrEqual => ">=".into(),
            Self::Less => "<".into(),
            Self::Greater => ">".into(),
            Self::And => "&&".into(),
            Self::Or => "||".into(),
            Self::Increment => "++".into(),
            Self::Decrement => "--".into(),
            Self::Plus => "+".into(),
            Self::Minus => "-".into(),
            Self::Asterisk => "*".into(),
            Self::Slash => "/".into(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into_cow_str())
    }
}

pub fn lexer<'code>()
-> impl Parser<'code, &'code str, Vec<Spanned<Token<'code>>>, extra::Err<ParseError<'code, char>>> {
    let bracket = choice((
        just('(').to(Token::BracketRoundOpen),
        just(')').to(Token::BracketRoundClose),
    ));

    // Longer operators first: `===` must win over `==`, `!=` over `!`.
    let comparator = choice((
        just("===").to(Token::StrictEqual),
        just("!==").to(Token::StrictNotEqual),
        just("==").to(Token::LooseEqual),
        just("!=").to(Token::LooseNotEqual),
        just("<=").to(Token::LessOrEqual),
        just(">=").to(Token::GreaterOrEqual),
        just('<').to(Token::Less),
        just('>').to(Token::Greater),
    ));

    let logical = choice((just("&&").to(Token::And), just("||").to(Token::Or)));

    let step = choice((
        just("++").to(Token::Increment),
        just("--").to(Token::Decrement),
    ));

    let arithmetic_operator = choice((
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Asterisk),
        just('/').to(Token::Slash),
    ));

    let punctuation = choice((
        just('.').to(Token::Dot),
        just(':').to(Token::Colon),
        just('?').to(Token::Question),
        just('!').to(Token::Bang),
        just('=').to(Token::Assign),
    ));

    // Leading zeros are plain decimal digits.
    let number = text::digits(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .from_str()
        .unwrapped()
        .map(Token::Number);

    // No escapes: a quote always terminates the literal.
    let text = just('\'')
        .ignore_then(none_of('\'').repeated().to_slice())
        .then_ignore(just('\''))
        .map(Token::Text);

    let identifier = any()
        .filter(|character: &char| {
            character.is_ascii_alphabetic() || *character == '_' || *character == '$'
        })
        .then(
            any()
                .filter(|character: &char| {
                    character.is_ascii_alphanumeric() || *character == '_' || *character == '$'
                })
                .repeated(),
        )
        .to_slice()
        .map(|identifier: &'code str| match identifier {
            "true" => Token::True,
            "false" => Token::False,
            _ => Token::Identifier(identifier),
        });

    let token = choice((
        bracket,
        number,
        text,
        identifier,
        comparator,
        logical,
        step,
        arithmetic_operator,
        punctuation,
    ));

    token
        .map_with(|token, extra| Spanned {
            node: token,
            span: extra.span(),
        })
        .padded()
        .repeated()
        .collect()
}
