//! Store error types.
//!
//! Returned by every [`DocumentStore`](crate::DocumentStore) backend.

use thiserror::Error;

/// Errors that can occur in document store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
