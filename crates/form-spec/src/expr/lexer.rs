use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while, take_while1},
    character::complete::{anychar, char, digit1},
    combinator::{map, opt, recognize, value},
    sequence::{pair, preceded, terminated},
};

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Question,
    Colon,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
}

impl TokenKind {
    pub(super) fn describe(&self) -> String {
        match self {
            TokenKind::Number(number) => format!("number {number}"),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Ident(name) => format!("name '{name}'"),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Dot => ".",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Bang => "!",
            TokenKind::Number(_) | TokenKind::Str(_) | TokenKind::Ident(_) => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// A lexeme before numbers are converted, so a malformed number can be
/// reported with its text.
enum Lexeme<'a> {
    Number(&'a str),
    Kind(TokenKind),
}

pub(super) fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut remaining = source;

    loop {
        if let Ok((rest, _)) = whitespace(remaining) {
            remaining = rest;
        }
        let Some(ch) = remaining.chars().next() else {
            return Ok(tokens);
        };
        let offset = source.len() - remaining.len();

        let (rest, lexeme) = token(remaining).map_err(|_| match ch {
            '\'' | '"' => ExprError::UnterminatedString { offset },
            _ => ExprError::UnexpectedChar { ch, offset },
        })?;
        let kind = match lexeme {
            Lexeme::Number(text) => {
                TokenKind::Number(text.parse().map_err(|_| ExprError::InvalidNumber {
                    text: text.to_string(),
                    offset,
                })?)
            }
            Lexeme::Kind(kind) => kind,
        };
        tokens.push(Token { kind, offset });
        remaining = rest;
    }
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_whitespace())(input)
}

fn token(input: &str) -> IResult<&str, Lexeme<'_>> {
    alt((
        map(number, Lexeme::Number),
        map(
            alt((identifier, string_literal, operator, delimiter)),
            Lexeme::Kind,
        ),
    ))(input)
}

// Digits and dots are taken greedily; `1.2.3` is rejected when converted.
fn number(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((digit1, recognize(pair(char('.'), digit1)))),
        take_while(|c: char| c.is_ascii_digit() || c == '.'),
    ))(input)
}

fn identifier(input: &str) -> IResult<&str, TokenKind> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_' || c == '$'),
            take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
        )),
        |name: &str| TokenKind::Ident(name.to_string()),
    )(input)
}

fn string_literal(input: &str) -> IResult<&str, TokenKind> {
    map(
        alt((quoted('\'', "\\'"), quoted('"', "\\\""))),
        TokenKind::Str,
    )(input)
}

fn quoted<'a>(quote: char, special: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    map(
        preceded(
            char(quote),
            terminated(
                opt(escaped_transform(is_not(special), '\\', escape)),
                char(quote),
            ),
        ),
        Option::unwrap_or_default,
    )
}

fn escape(input: &str) -> IResult<&str, char> {
    alt((
        value('\n', char('n')),
        value('\t', char('t')),
        value('\r', char('r')),
        anychar,
    ))(input)
}

fn operator(input: &str) -> IResult<&str, TokenKind> {
    alt((
        // `===` and `!==` are accepted as synonyms.
        value(TokenKind::EqEq, alt((tag("==="), tag("==")))),
        value(TokenKind::NotEq, alt((tag("!=="), tag("!=")))),
        value(TokenKind::Le, tag("<=")),
        value(TokenKind::Ge, tag(">=")),
        value(TokenKind::AndAnd, tag("&&")),
        value(TokenKind::OrOr, tag("||")),
        value(TokenKind::Lt, tag("<")),
        value(TokenKind::Gt, tag(">")),
        value(TokenKind::Bang, tag("!")),
        value(TokenKind::Plus, tag("+")),
        value(TokenKind::Minus, tag("-")),
        value(TokenKind::Star, tag("*")),
        value(TokenKind::Slash, tag("/")),
        value(TokenKind::Percent, tag("%")),
        value(TokenKind::Question, tag("?")),
        value(TokenKind::Colon, tag(":")),
    ))(input)
}

fn delimiter(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::LBracket, char('[')),
        value(TokenKind::RBracket, char(']')),
        value(TokenKind::Dot, char('.')),
    ))(input)
}
