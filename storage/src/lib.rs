//! Storage crate: room-scoped persistence for captured mail.
//!
//! Messages are grouped by room (one test inbox each), capped per room, and
//! listed newest first with optional search on sender, recipient and subject.
//! Persistence goes through any [`docstore_core::DocumentStore`] backend.
//!
//! ## Modules
//!
//! - [`room`] – RoomKey normalization
//! - [`models`] – CapturedMessage, StoredMessage, SearchQuery, MessagePage
//! - [`messages_repo`] – MessagesRepo (one room)
//! - [`rooms_repo`] – RoomsRepo (all rooms)
//! - [`storage`] – MessageStorage facade
//! - [`config`] – StorageConfig
//! - [`error`] – Storage error types

pub mod config;
mod context;
pub mod error;
pub mod messages_repo;
pub mod models;
pub mod room;
pub mod rooms_repo;
pub mod storage;

#[cfg(test)]
mod rooms_repo_test;
#[cfg(test)]
mod test_helpers;

pub use config::{RetentionMode, StorageConfig, DEFAULT_COLLECTION};
pub use error::{Result, StorageError};
pub use messages_repo::MessagesRepo;
pub use models::{
    CapturedMessage, Email, EmailAddress, Envelope, MessageId, MessagePage, SearchField,
    SearchQuery, StoredMessage, SEARCH_PARAM_CONTENT, SEARCH_PARAM_FROM, SEARCH_PARAM_TO,
};
pub use room::{RoomKey, DEFAULT_ROOM};
pub use rooms_repo::RoomsRepo;
pub use storage::MessageStorage;
