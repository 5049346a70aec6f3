//! API Error Types
//!
//! Maps query, storage and request errors to HTTP responses. Query errors
//! carry the machine-readable code and span the search box needs to
//! highlight the offending input.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::query::{InvalidQuery, QueryError};
use crate::storage::StorageError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Query text could not be compiled
    #[error("{0}")]
    Query(#[from] QueryError),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Body of a rejected search query
#[derive(Serialize)]
pub struct QueryErrorResponse {
    pub message: String,
    pub status: u16,
    pub details: QueryErrorDetails,
    pub request_id: String,
}

#[derive(Serialize)]
pub struct QueryErrorDetails {
    /// `invalid_field`, `invalid_operation`, `invalid_syntax` or `invalid_query`
    pub error: String,
    pub message: String,
    pub span: crate::query::Span,
}

impl From<InvalidQuery> for QueryErrorDetails {
    fn from(invalid: InvalidQuery) -> Self {
        Self {
            error: invalid.code.to_string(),
            message: invalid.message,
            span: invalid.span,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::new_v4().to_string();

        if let ApiError::Query(e) = &self {
            let invalid = e.to_invalid_query();
            tracing::info!(
                request_id = %request_id,
                error_code = %invalid.code,
                start = invalid.span.start,
                end = invalid.span.end,
                "Rejected search query"
            );

            let status = StatusCode::BAD_REQUEST;
            let body = QueryErrorResponse {
                message: invalid.message.clone(),
                status: status.as_u16(),
                details: invalid.into(),
                request_id,
            };
            return (status, Json(body)).into_response();
        }

        let (status, code) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Storage(StorageError::UnknownSortField(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            ApiError::Internal(_) | ApiError::Query(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        };

        tracing::error!(
            request_id = %request_id,
            error_code = %code,
            error_message = %self,
            "API error occurred"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{LexError, QueryError};

    #[test]
    fn test_query_error_is_bad_request() {
        let err = ApiError::Query(QueryError::Lex(LexError::UnterminatedQuote { offset: 6 }));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unknown_sort_field_is_bad_request() {
        let err = ApiError::Storage(StorageError::UnknownSortField("nope".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_storage_error_is_internal() {
        let err = ApiError::Storage(StorageError::Lock("poisoned".to_string()));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
