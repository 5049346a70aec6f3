//! Query Tokenizer
//!
//! Splits raw query text into a flat token stream with byte spans.
//!
//! ```text
//! genre:Fiction AND (price>=10 OR "space opera")
//! ^^^^^ WORD
//!      ^ OPERATOR
//!       ^^^^^^^ WORD
//!               ^^^ BOOLEAN_KEYWORD
//!                   ^ LPAREN
//!                                 ^^^^^^^^^^^^^ QUOTED_STRING
//! ```
//!
//! Operators are matched longest first (`!:*` before `!:` before `:`). A word
//! runs until whitespace, a paren, a double quote or the start of an operator.
//! A single quote only opens a string at the start of a token, so `O'Brien`
//! stays one word.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{anychar, char, one_of, satisfy},
    combinator::{not, recognize},
    multi::many1_count,
    sequence::{delimited, preceded},
    IResult,
};

use crate::query::ast::{Operator, Span};
use crate::query::error::LexError;

/// Boolean keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Or,
    Not,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("and") {
            Some(Keyword::And)
        } else if word.eq_ignore_ascii_case("or") {
            Some(Keyword::Or)
        } else if word.eq_ignore_ascii_case("not") {
            Some(Keyword::Not)
        } else {
            None
        }
    }
}

/// Token categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    QuotedString,
    Operator(Operator),
    Keyword(Keyword),
    LParen,
    RParen,
    Eof,
}

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Token text. Quoted strings hold their contents without the quotes.
    pub text: String,
    pub span: Span,
    /// False only for a quoted string missing its closing quote (lenient mode)
    pub terminated: bool,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
            terminated: true,
        }
    }

    /// Human-readable description used in parse errors
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Word => format!("'{}'", self.text),
            TokenKind::QuotedString => format!("\"{}\"", self.text),
            TokenKind::Operator(op) => format!("operator '{}'", op),
            TokenKind::Keyword(_) => format!("keyword '{}'", self.text.to_uppercase()),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

/// Tokenize a complete query. Fails on an unterminated quote.
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    lex(text, false)
}

/// Tokenize text that may still be being typed. Never fails; an open quote
/// yields a quoted token with `terminated == false`.
pub fn tokenize_partial(text: &str) -> Vec<Token> {
    lex(text, true).unwrap_or_else(|_| vec![Token::new(TokenKind::Eof, "", Span::point(text.len()))])
}

fn lex(text: &str, lenient: bool) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut rest = text;

    loop {
        rest = rest.trim_start();
        let offset = text.len() - rest.len();
        if rest.is_empty() {
            break;
        }

        if let Ok((after, op)) = operator(rest) {
            let consumed = rest.len() - after.len();
            tokens.push(Token::new(
                TokenKind::Operator(op),
                op.lexeme(),
                Span::new(offset, offset + consumed),
            ));
            rest = after;
            continue;
        }

        if let Some(after) = rest.strip_prefix('(') {
            tokens.push(Token::new(TokenKind::LParen, "(", Span::new(offset, offset + 1)));
            rest = after;
            continue;
        }

        if let Some(after) = rest.strip_prefix(')') {
            tokens.push(Token::new(TokenKind::RParen, ")", Span::new(offset, offset + 1)));
            rest = after;
            continue;
        }

        if rest.starts_with('"') || rest.starts_with('\'') {
            match quoted(rest) {
                Ok((after, contents)) => {
                    let consumed = rest.len() - after.len();
                    tokens.push(Token::new(
                        TokenKind::QuotedString,
                        contents,
                        Span::new(offset, offset + consumed),
                    ));
                    rest = after;
                }
                Err(_) if lenient => {
                    let mut token = Token::new(
                        TokenKind::QuotedString,
                        &rest[1..],
                        Span::new(offset, text.len()),
                    );
                    token.terminated = false;
                    tokens.push(token);
                    rest = "";
                }
                Err(_) => return Err(LexError::UnterminatedQuote { offset }),
            }
            continue;
        }

        match word(rest) {
            Ok((after, w)) => {
                // A word glued to an operator is a field name, never a keyword
                let kind = match Keyword::from_word(w) {
                    Some(kw) if operator(after).is_err() => TokenKind::Keyword(kw),
                    _ => TokenKind::Word,
                };
                tokens.push(Token::new(kind, w, Span::new(offset, offset + w.len())));
                rest = after;
            }
            Err(_) => {
                // Unreachable for non-empty input: every other start char is
                // handled above. Consume one char to guarantee progress.
                let ch_len = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                tokens.push(Token::new(
                    TokenKind::Word,
                    &rest[..ch_len],
                    Span::new(offset, offset + ch_len),
                ));
                rest = &rest[ch_len..];
            }
        }
    }

    tokens.push(Token::new(TokenKind::Eof, "", Span::point(text.len())));
    Ok(tokens)
}

/// Longest-match operator, tried in [`Operator::LEXEMES`] order
fn operator(input: &str) -> IResult<&str, Operator> {
    for (lexeme, op) in Operator::LEXEMES {
        if let Ok((rest, _)) = tag::<_, _, nom::error::Error<&str>>(lexeme)(input) {
            return Ok((rest, op));
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Tag,
    )))
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
    ))(input)
}

fn word_boundary(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(satisfy(char::is_whitespace)),
        recognize(one_of("()\"")),
        recognize(operator),
    ))(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    recognize(many1_count(preceded(not(word_boundary), anychar)))(input)
}
