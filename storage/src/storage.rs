//! Storage facade.
//!
//! Owns the backend handle and configuration, and hands out repositories
//! bound to them. Cloning a `MessageStorage` shares the same context.

use crate::config::StorageConfig;
use crate::context::StorageContext;
use crate::error::{Result, StorageError};
use crate::messages_repo::MessagesRepo;
use crate::models::stored_message::{FIELD_ID, FIELD_ROOM};
use crate::room::RoomKey;
use crate::rooms_repo::RoomsRepo;
use docstore_core::{DocumentStore, IndexModel};
use std::sync::Arc;
use tracing::{debug, info_span, Instrument, Span};

#[derive(Clone)]
pub struct MessageStorage {
    context: Arc<StorageContext>,
}

impl MessageStorage {
    /// Prepares `store` for message storage and returns the facade.
    ///
    /// Creates the unique `(room desc, id asc)` index on the configured
    /// collection; failing to do so is a [`StorageError::Configuration`].
    pub async fn create(store: Arc<dyn DocumentStore>, config: StorageConfig) -> Result<Self> {
        let span = info_span!("message_storage", collection = %config.collection);
        Self::create_with_span(store, config, span).await
    }

    /// Like [`create`](Self::create), logging every operation under `span`.
    pub async fn create_with_span(
        store: Arc<dyn DocumentStore>,
        config: StorageConfig,
        span: Span,
    ) -> Result<Self> {
        let context = Arc::new(StorageContext::new(store, config, span.clone()));

        let index = IndexModel::new().desc(FIELD_ROOM).asc(FIELD_ID).unique(true);
        let name = context
            .run(
                context.config.operation_timeout,
                context.store.create_index(context.collection(), index),
            )
            .instrument(span.clone())
            .await
            .map_err(|e| StorageError::Configuration(format!("failed to create index: {}", e)))?;

        span.in_scope(|| debug!("Index [{}] created", name));
        Ok(Self { context })
    }

    /// Repository for `room`; an empty room means the default room.
    pub fn messages_repo(&self, room: &str) -> MessagesRepo {
        MessagesRepo::new(self.context.clone(), RoomKey::normalize(room))
    }

    pub fn rooms_repo(&self) -> RoomsRepo {
        RoomsRepo::new(self.context.clone())
    }

    pub fn config(&self) -> &StorageConfig {
        &self.context.config
    }

    #[cfg(test)]
    pub(crate) fn locked_rooms(&self) -> usize {
        self.context.locked_rooms()
    }
}
