//! Cursor context classification
//!
//! Looks at the text left of the cursor and decides what the user is typing:
//!
//! ```text
//! gen|                 field name, prefix "gen"
//! genre|               field name (complete: operators are offered too)
//! genre:|              value of genre, empty prefix
//! genre:Fi|            value of genre, prefix "Fi"
//! genre:"Science F|    value of genre inside an open quote
//! genre:Fiction |      start of a new term: any field name
//! "open regex|         nothing
//! ```

use crate::query::{tokenize_partial, Operator, Span, Token, TokenKind};

/// What the cursor is positioned on
#[derive(Debug, Clone, PartialEq)]
pub enum CursorContext {
    /// Typing a field name or bare search word; `span` is replaced
    FieldName { prefix: String, span: Span },
    /// Typing the value of `field` after `op`; `span` is replaced
    Value {
        field: String,
        op: Operator,
        prefix: String,
        span: Span,
        quoted: bool,
    },
    /// Nothing useful to suggest
    None,
}

/// Classify `text`, which must end at the cursor
pub fn classify(text: &str) -> CursorContext {
    let tokens: Vec<Token> = tokenize_partial(text)
        .into_iter()
        .filter(|t| !t.is_eof())
        .collect();
    let cursor = text.len();

    let Some(last) = tokens.last() else {
        return CursorContext::FieldName {
            prefix: String::new(),
            span: Span::point(cursor),
        };
    };
    let n = tokens.len();

    // Field and operator preceding token `i`
    let comparison_before = |i: usize| -> Option<(&Token, Operator)> {
        if i < 2 {
            return None;
        }
        match (tokens[i - 2].kind, tokens[i - 1].kind) {
            (TokenKind::Word, TokenKind::Operator(op)) if !op.is_unary() => {
                Some((&tokens[i - 2], op))
            }
            _ => None,
        }
    };

    if last.kind == TokenKind::QuotedString && !last.terminated {
        return match comparison_before(n - 1) {
            Some((field, op)) => CursorContext::Value {
                field: field.text.clone(),
                op,
                prefix: last.text.clone(),
                span: last.span,
                quoted: true,
            },
            None => CursorContext::None,
        };
    }

    let touching = last.span.end == cursor;
    let new_term = CursorContext::FieldName {
        prefix: String::new(),
        span: Span::point(cursor),
    };

    match last.kind {
        TokenKind::Operator(op) if !op.is_unary() => match n.checked_sub(2).map(|i| &tokens[i]) {
            Some(field) if field.kind == TokenKind::Word => CursorContext::Value {
                field: field.text.clone(),
                op,
                prefix: String::new(),
                span: Span::point(cursor),
                quoted: false,
            },
            _ => CursorContext::None,
        },
        TokenKind::Operator(_) => {
            if touching {
                CursorContext::None
            } else {
                new_term
            }
        }
        TokenKind::Word | TokenKind::Keyword(_) if touching => match comparison_before(n - 1) {
            Some((field, op)) => CursorContext::Value {
                field: field.text.clone(),
                op,
                prefix: last.text.clone(),
                span: last.span,
                quoted: false,
            },
            None => CursorContext::FieldName {
                prefix: last.text.clone(),
                span: last.span,
            },
        },
        TokenKind::QuotedString | TokenKind::RParen if touching => CursorContext::None,
        _ => new_term,
    }
}
