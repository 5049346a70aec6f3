//! Query error types
//!
//! Each stage of the pipeline has its own error family. All of them fold into
//! [`QueryError`], which knows the stable error code reported to clients and
//! the span of the offending text.

use crate::query::ast::{Operator, Span};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Tokenizer failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    /// A quote was opened but never closed
    #[error("Unterminated quoted string starting at offset {offset}")]
    UnterminatedQuote { offset: usize },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnterminatedQuote { offset } => Span::new(*offset, offset + 1),
        }
    }
}

/// Grammar violations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Found a token the grammar does not allow at this position
    #[error("Unexpected {found} at {span}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        span: Span,
    },

    /// Parenthesized group with nothing inside
    #[error("Empty group at {span}")]
    EmptyQuery { span: Span },

    /// Groups or `NOT` nested beyond [`MAX_NESTING`](crate::query::MAX_NESTING)
    #[error("Nesting deeper than {limit} levels at {span}")]
    NestingTooDeep { limit: usize, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::EmptyQuery { span }
            | ParseError::NestingTooDeep { span, .. } => *span,
        }
    }
}

/// Schema validation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Unknown field: {name}")]
    UnknownField { name: String, span: Span },

    #[error("Operator '{operator}' is not supported for field '{field}'")]
    OperatorNotSupported {
        field: String,
        operator: Operator,
        span: Span,
    },

    #[error("Invalid value '{value}' for field '{field}': expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
        span: Span,
    },

    #[error("Invalid regular expression '{pattern}': {reason}")]
    InvalidPattern {
        pattern: String,
        reason: String,
        span: Span,
    },
}

impl ResolveError {
    pub fn span(&self) -> Span {
        match self {
            ResolveError::UnknownField { span, .. }
            | ResolveError::OperatorNotSupported { span, .. }
            | ResolveError::InvalidValue { span, .. }
            | ResolveError::InvalidPattern { span, .. } => *span,
        }
    }
}

/// Stable error codes exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidField,
    InvalidOperation,
    InvalidSyntax,
    InvalidQuery,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidField => "invalid_field",
            ErrorCode::InvalidOperation => "invalid_operation",
            ErrorCode::InvalidSyntax => "invalid_syntax",
            ErrorCode::InvalidQuery => "invalid_query",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while turning query text into a predicate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Syntax error: {0}")]
    Lex(#[from] LexError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid query: {0}")]
    Resolve(#[from] ResolveError),
}

impl QueryError {
    /// Error code for the API layer
    pub fn code(&self) -> ErrorCode {
        match self {
            QueryError::Lex(_) | QueryError::Parse(_) => ErrorCode::InvalidSyntax,
            QueryError::Resolve(ResolveError::UnknownField { .. }) => ErrorCode::InvalidField,
            QueryError::Resolve(ResolveError::OperatorNotSupported { .. })
            | QueryError::Resolve(ResolveError::InvalidValue { .. }) => ErrorCode::InvalidOperation,
            QueryError::Resolve(ResolveError::InvalidPattern { .. }) => ErrorCode::InvalidQuery,
        }
    }

    /// Location of the offending text
    pub fn span(&self) -> Span {
        match self {
            QueryError::Lex(e) => e.span(),
            QueryError::Parse(e) => e.span(),
            QueryError::Resolve(e) => e.span(),
        }
    }

    /// Message suitable for showing next to the search box
    pub fn user_message(&self) -> String {
        match self {
            QueryError::Lex(LexError::UnterminatedQuote { .. }) => {
                "Missing closing quote in search query".to_string()
            }
            QueryError::Parse(ParseError::UnexpectedToken {
                found, expected, ..
            }) => format!("Unexpected {} in search query, expected {}", found, expected),
            QueryError::Parse(ParseError::EmptyQuery { .. }) => {
                "Empty parentheses in search query".to_string()
            }
            QueryError::Parse(ParseError::NestingTooDeep { limit, .. }) => format!(
                "Search query is nested too deeply (more than {} levels)",
                limit
            ),
            QueryError::Resolve(ResolveError::UnknownField { name, .. }) => {
                format!("Invalid field: '{}' is not a searchable field", name)
            }
            QueryError::Resolve(ResolveError::OperatorNotSupported {
                field, operator, ..
            }) => format!(
                "Invalid operation: '{}' cannot be used with field '{}'",
                operator, field
            ),
            QueryError::Resolve(ResolveError::InvalidValue {
                field,
                value,
                expected,
                ..
            }) => format!(
                "Invalid operation: '{}' is not a valid value for '{}' (expected {})",
                value, field, expected
            ),
            QueryError::Resolve(ResolveError::InvalidPattern { pattern, .. }) => {
                format!("Invalid regular expression '{}'", pattern)
            }
        }
    }

    pub fn to_invalid_query(&self) -> InvalidQuery {
        InvalidQuery {
            code: self.code(),
            message: self.user_message(),
            span: self.span(),
        }
    }
}

/// Serialized form of a rejected query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidQuery {
    pub code: ErrorCode,
    pub message: String,
    pub span: Span,
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let lex: QueryError = LexError::UnterminatedQuote { offset: 4 }.into();
        assert_eq!(lex.code(), ErrorCode::InvalidSyntax);
        assert_eq!(lex.span(), Span::new(4, 5));

        let unknown: QueryError = ResolveError::UnknownField {
            name: "colour".to_string(),
            span: Span::new(0, 6),
        }
        .into();
        assert_eq!(unknown.code().as_str(), "invalid_field");

        let op: QueryError = ResolveError::OperatorNotSupported {
            field: "price".to_string(),
            operator: Operator::Matches,
            span: Span::new(0, 8),
        }
        .into();
        assert_eq!(op.code().as_str(), "invalid_operation");

        let pattern: QueryError = ResolveError::InvalidPattern {
            pattern: "(".to_string(),
            reason: "unclosed group".to_string(),
            span: Span::new(5, 8),
        }
        .into();
        assert_eq!(pattern.code().as_str(), "invalid_query");
    }

    #[test]
    fn test_user_message_names_field_and_operator() {
        let err: QueryError = ResolveError::OperatorNotSupported {
            field: "price".to_string(),
            operator: Operator::Matches,
            span: Span::new(0, 8),
        }
        .into();
        let message = err.user_message();
        assert!(message.contains("price"));
        assert!(message.contains("=~"));
    }

    #[test]
    fn test_invalid_query_serializes_code() {
        let err: QueryError = ParseError::UnexpectedToken {
            found: "end of input".to_string(),
            expected: "a value".to_string(),
            span: Span::point(6),
        }
        .into();
        let json = serde_json::to_value(err.to_invalid_query()).unwrap();
        assert_eq!(json["code"], "invalid_syntax");
        assert_eq!(json["span"]["start"], 6);
    }
}
