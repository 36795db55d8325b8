//! Room repository: operations across all rooms.
//!
//! Rooms are not stored anywhere; they are the distinct `room` values of the
//! message collection, computed with group-by-room aggregations.

use crate::context::StorageContext;
use crate::error::Result;
use crate::models::stored_message::FIELD_ROOM;
use crate::room::RoomKey;
use docstore_core::{Filter, SortSpec, Stage};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Deserialize)]
struct RoomGroup {
    #[serde(rename = "_id")]
    room: RoomKey,
}

#[derive(Deserialize)]
struct RoomCount {
    count: u64,
}

fn group_by_room() -> Stage {
    Stage::Group {
        key: FIELD_ROOM.to_string(),
    }
}

#[derive(Clone)]
pub struct RoomsRepo {
    context: Arc<StorageContext>,
    deadline: Option<Duration>,
}

impl RoomsRepo {
    pub(crate) fn new(context: Arc<StorageContext>) -> Self {
        let deadline = context.config.operation_timeout;
        Self { context, deadline }
    }

    /// Bounds every backend call by `limit` instead of the configured timeout.
    pub fn with_timeout(self, limit: Duration) -> Self {
        self.with_deadline(Some(limit))
    }

    pub(crate) fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: Future<Output = docstore_core::Result<T>>,
    {
        self.context.run(self.deadline, op).await
    }

    /// Room keys that hold at least one message, ascending, paged.
    #[instrument(parent = &self.context.span, skip_all, fields(offset = offset, limit = limit))]
    pub async fn list(&self, offset: usize, limit: usize) -> Result<Vec<RoomKey>> {
        let pipeline = [
            group_by_room(),
            Stage::Sort(SortSpec::asc("_id")),
            Stage::Skip(offset),
            Stage::Limit(limit),
        ];
        let groups = self
            .run(self.context.store.aggregate(self.context.collection(), &pipeline))
            .await?;

        let rooms = groups
            .into_iter()
            .map(|doc| serde_json::from_value::<RoomGroup>(doc).map(|g| g.room))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rooms)
    }

    /// Number of distinct rooms; 0 when there are no messages at all.
    #[instrument(parent = &self.context.span, skip_all)]
    pub async fn count(&self) -> Result<usize> {
        let pipeline = [
            group_by_room(),
            Stage::Count {
                into: "count".to_string(),
            },
        ];
        let results = self
            .run(self.context.store.aggregate(self.context.collection(), &pipeline))
            .await?;

        match results.into_iter().next() {
            Some(doc) => Ok(serde_json::from_value::<RoomCount>(doc)?.count as usize),
            None => Ok(0),
        }
    }

    /// Deletes every message in `room`. Deleting an empty room succeeds.
    ///
    /// Returns the number of messages removed.
    pub async fn delete(&self, room: &str) -> Result<u64> {
        self.delete_key(&RoomKey::normalize(room)).await
    }

    #[instrument(parent = &self.context.span, skip_all, fields(room = %room))]
    pub(crate) async fn delete_key(&self, room: &RoomKey) -> Result<u64> {
        let filter = Filter::eq(FIELD_ROOM, room.as_str());
        let deleted = self
            .run(self.context.store.delete_many(self.context.collection(), &filter))
            .await?;

        debug!("Deleted room [{}] ({} items)", room, deleted);
        Ok(deleted)
    }
}
