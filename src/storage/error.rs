//! Storage error types
//!
//! Defines all errors that can occur in the SQLite record store.

use thiserror::Error;

/// Errors that can occur in the record store
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite call failed
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Imported record does not fit the table layout
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Table layout names an unusable identifier
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    /// Sort key is not a catalog field
    #[error("Unknown sort field: {0}")]
    UnknownSortField(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),

    /// Blocking task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),

    /// Result rendering failed
    #[error("Export error: {0}")]
    Export(String),
}

impl From<csv::Error> for StorageError {
    fn from(err: csv::Error) -> Self {
        StorageError::Export(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::Task(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
