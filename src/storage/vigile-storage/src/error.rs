//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entry already exists.
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// Connection error.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Query or statement failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Stored data could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid input (bad location name, malformed key, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Backend is temporarily unavailable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
