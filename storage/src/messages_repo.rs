//! Message repository: per-room persistence, retention and search.
//!
//! A `MessagesRepo` is bound to one [`RoomKey`] and is cheap to create; the
//! storage facade hands out a fresh one per call site.
//!
//! Every backend call runs under the configured `operation_timeout`, or the
//! deadline set with [`MessagesRepo::with_timeout`]. Dropping a returned
//! future cancels the call.
//!
//! Retention is a coarse capacity flush, not per-message eviction: when a
//! room already holds `per_room_limit` messages, the whole room is emptied
//! before the next message is inserted.

use crate::context::StorageContext;
use crate::error::{Result, StorageError};
use crate::models::stored_message::{FIELD_DATE, FIELD_ID, FIELD_ROOM};
use crate::models::{CapturedMessage, MessageId, MessagePage, SearchQuery, StoredMessage};
use crate::room::RoomKey;
use crate::rooms_repo::RoomsRepo;
use docstore_core::{Filter, FindOptions, SortSpec, StoreError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Builds the listing filter: this room, and any recognized search term.
///
/// Terms are OR'ed across fields and across each field's name/address paths.
pub(crate) fn search_filter(room: &RoomKey, query: &SearchQuery) -> Filter {
    let mut clauses = vec![Filter::eq(FIELD_ROOM, room.as_str())];

    let texts: Vec<Filter> = query
        .terms()
        .flat_map(|(field, pattern)| {
            field
                .paths()
                .iter()
                .map(move |path| Filter::regex(*path, pattern))
        })
        .collect();
    if !texts.is_empty() {
        clauses.push(Filter::or(texts));
    }

    Filter::and(clauses)
}

fn message_filter(room: &RoomKey, id: &MessageId) -> Filter {
    Filter::and(vec![
        Filter::eq(FIELD_ROOM, room.as_str()),
        Filter::eq(FIELD_ID, id.as_str()),
    ])
}

#[derive(Clone)]
pub struct MessagesRepo {
    context: Arc<StorageContext>,
    room: RoomKey,
    deadline: Option<Duration>,
}

impl MessagesRepo {
    pub(crate) fn new(context: Arc<StorageContext>, room: RoomKey) -> Self {
        let deadline = context.config.operation_timeout;
        Self {
            context,
            room,
            deadline,
        }
    }

    /// Same room, with every backend call bounded by `limit` instead of the
    /// configured timeout.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.deadline = Some(limit);
        self
    }

    pub fn room(&self) -> &RoomKey {
        &self.room
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: Future<Output = docstore_core::Result<T>>,
    {
        self.context.run(self.deadline, op).await
    }

    /// Stores `message` in this room and returns its own id.
    ///
    /// If the room is at its limit, every message in it is deleted first.
    #[instrument(parent = &self.context.span, skip_all, fields(room = %self.room, id = %message.id))]
    pub async fn store(&self, message: &CapturedMessage) -> Result<MessageId> {
        let _guard = self.context.lock_room(&self.room).await;

        let limit = self.context.config.per_room_limit;
        if limit > 0 && self.count().await? >= limit {
            let removed = RoomsRepo::new(self.context.clone())
                .with_deadline(self.deadline)
                .delete_key(&self.room)
                .await?;
            debug!("Room [{}] reached limit {}, flushed {} messages", self.room, limit, removed);
        }

        let document = StoredMessage::new(&self.room, message).to_document()?;
        let inserted = self
            .run(self.context.store.insert_one(self.context.collection(), document))
            .await
            .map_err(|e| match e {
                StorageError::Store(StoreError::DuplicateKey(_)) => StorageError::AlreadyExists {
                    room: self.room.clone(),
                    id: message.id.clone(),
                },
                other => other,
            })?;

        debug!("New message saved, id={}, inserted_id={}", message.id, inserted);
        Ok(message.id.clone())
    }

    /// Lists messages matching `query`, newest first.
    ///
    /// `total` counts all matches before paging. The count and the page are
    /// read separately, so a concurrent writer can make them disagree.
    #[instrument(parent = &self.context.span, skip_all, fields(room = %self.room, offset = offset, limit = limit))]
    pub async fn list(&self, query: &SearchQuery, offset: usize, limit: usize) -> Result<MessagePage> {
        let filter = search_filter(&self.room, query);
        let collection = self.context.collection();

        let total = self
            .run(self.context.store.count_documents(collection, &filter))
            .await? as usize;

        if limit == 0 || offset >= total {
            return Ok(MessagePage {
                messages: Vec::new(),
                total,
            });
        }

        let options = FindOptions::new()
            .sort(SortSpec::desc(FIELD_DATE))
            .skip(offset)
            .limit(limit);
        let documents = self
            .run(self.context.store.find(collection, &filter, options))
            .await?;

        let messages = documents
            .into_iter()
            .map(|doc| StoredMessage::from_document(doc).map(|stored| stored.message))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Listed {} of {} messages", messages.len(), total);
        Ok(MessagePage { messages, total })
    }

    /// Number of messages in this room.
    #[instrument(parent = &self.context.span, skip_all, fields(room = %self.room))]
    pub async fn count(&self) -> Result<usize> {
        let filter = Filter::eq(FIELD_ROOM, self.room.as_str());
        let count = self
            .run(self.context.store.count_documents(self.context.collection(), &filter))
            .await?;
        Ok(count as usize)
    }

    /// Deletes one message.
    ///
    /// Nothing deleted is [`StorageError::NotFound`]; more than one is
    /// [`StorageError::UnexpectedDeleteCount`].
    #[instrument(parent = &self.context.span, skip_all, fields(room = %self.room, id = %id))]
    pub async fn delete(&self, id: &MessageId) -> Result<()> {
        let filter = message_filter(&self.room, id);
        let deleted = self
            .run(self.context.store.delete_one(self.context.collection(), &filter))
            .await?;

        match deleted {
            1 => Ok(()),
            0 => Err(StorageError::NotFound {
                room: self.room.clone(),
                id: id.clone(),
            }),
            n => Err(StorageError::UnexpectedDeleteCount(n)),
        }
    }

    /// Loads one message payload.
    #[instrument(parent = &self.context.span, skip_all, fields(room = %self.room, id = %id))]
    pub async fn load(&self, id: &MessageId) -> Result<CapturedMessage> {
        let filter = message_filter(&self.room, id);
        let document = self
            .run(self.context.store.find_one(self.context.collection(), &filter))
            .await?
            .ok_or_else(|| StorageError::NotFound {
                room: self.room.clone(),
                id: id.clone(),
            })?;

        Ok(StoredMessage::from_document(document)?.message)
    }
}
