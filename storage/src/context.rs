//! Shared state behind a `MessageStorage` and every repository it hands out.

use crate::config::{RetentionMode, StorageConfig};
use crate::error::{Result, StorageError};
use crate::room::RoomKey;
use docstore_core::DocumentStore;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::Span;

type RoomLocks = Mutex<HashMap<RoomKey, Arc<tokio::sync::Mutex<()>>>>;

pub(crate) struct StorageContext {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) config: StorageConfig,
    /// Parent span for every repository operation.
    pub(crate) span: Span,
    room_locks: RoomLocks,
}

impl StorageContext {
    pub(crate) fn new(store: Arc<dyn DocumentStore>, config: StorageConfig, span: Span) -> Self {
        Self {
            store,
            config,
            span,
            room_locks: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn collection(&self) -> &str {
        &self.config.collection
    }

    /// Awaits one backend call, failing with [`StorageError::Timeout`] once
    /// `deadline` passes. Dropping the returned future abandons the call.
    pub(crate) async fn run<T, F>(&self, deadline: Option<Duration>, op: F) -> Result<T>
    where
        F: Future<Output = docstore_core::Result<T>>,
    {
        match deadline {
            Some(limit) => match tokio::time::timeout(limit, op).await {
                Ok(result) => result.map_err(StorageError::from),
                Err(_) => Err(StorageError::Timeout(limit)),
            },
            None => op.await.map_err(StorageError::from),
        }
    }

    /// Holds the write lock for `room` in serialized retention mode; `None`
    /// in best-effort mode.
    pub(crate) async fn lock_room(&self, room: &RoomKey) -> Option<RoomGuard<'_>> {
        if self.config.retention != RetentionMode::Serialized {
            return None;
        }
        let lock = {
            let mut locks = self.room_locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(room.clone()).or_default().clone()
        };
        Some(RoomGuard {
            locks: &self.room_locks,
            room: room.clone(),
            guard: Some(lock.lock_owned().await),
        })
    }

    #[cfg(test)]
    pub(crate) fn locked_rooms(&self) -> usize {
        self.room_locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Releases a room's write lock on drop, and forgets the room once no other
/// store holds or waits for it.
pub(crate) struct RoomGuard<'a> {
    locks: &'a RoomLocks,
    room: RoomKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RoomGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&self.room)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.room);
        }
    }
}
