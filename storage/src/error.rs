//! Storage error types.
//!
//! Used by the repositories and the storage facade. Backend failures are
//! carried unchanged in [`StorageError::Store`].

use crate::models::MessageId;
use crate::room::RoomKey;
use docstore_core::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when using storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Not found: message {id} in room {room}")]
    NotFound { room: RoomKey, id: MessageId },
    #[error("Already exists: message {id} in room {room}")]
    AlreadyExists { room: RoomKey, id: MessageId },
    #[error("Unexpected count of deleted items, expected 1, got {0}")]
    UnexpectedDeleteCount(u64),
    #[error("Config error: {0}")]
    Configuration(String),
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Store(StoreError::Serialization(e))
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
