//! Shared fixtures for the storage unit tests.

use crate::config::StorageConfig;
use crate::models::CapturedMessage;
use crate::storage::MessageStorage;
use async_trait::async_trait;
use docstore_core::{
    Document, DocumentStore, Filter, FindOptions, IndexModel, InsertedId, Stage, StoreError,
};
use docstore_inmemory::InMemoryDocumentStore;
use std::sync::Arc;
use std::time::Duration;

/// Facade over a fresh in-memory store; the store is returned for raw counts.
pub(crate) async fn storage_with_limit(limit: usize) -> (MessageStorage, InMemoryDocumentStore) {
    let store = InMemoryDocumentStore::new();
    let storage = MessageStorage::create(
        Arc::new(store.clone()),
        StorageConfig::with_per_room_limit(limit),
    )
    .await
    .expect("Failed to create storage");
    (storage, store)
}

/// Message `i` with sender `quix-i@quib.com`, recipient `foo-i@quib.com`,
/// dated `i` minutes after a fixed base, so later `i` sorts first.
pub(crate) fn quix_message(i: usize) -> CapturedMessage {
    CapturedMessage::new(i.to_string()).with_origin(format!(
        "From: Rares <quix-{i}@quib.com>\r\n\
Date: Thu, 2 May 2019 11:{i:02}:35 +0300\r\n\
Subject: Re: kern/54143 (virtualbox) #{i}\r\n\
To: foo-{i}@quib.com\r\n\
Content-Type: multipart/mixed; boundary=\"0000000000007e2bb40587e36196\"\r\n\
\r\n\
--0000000000007e2bb40587e36196\r\n\
Content-Type: text/html; charset=\"UTF-8\"\r\n\
\r\n\
<div dir=\"ltr\"><div>html text part</div></div>\r\n\
\r\n\
--0000000000007e2bb40587e36196--\r\n"
    ))
}

/// Backend wrapper that can delay every call or refuse index creation.
#[derive(Clone, Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: InMemoryDocumentStore,
    pub(crate) delay: Option<Duration>,
    pub(crate) refuse_index: bool,
}

impl FlakyStore {
    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn create_index(&self, collection: &str, index: IndexModel) -> docstore_core::Result<String> {
        if self.refuse_index {
            return Err(StoreError::Database("index creation refused".to_string()));
        }
        self.inner.create_index(collection, index).await
    }

    async fn insert_one(&self, collection: &str, document: Document) -> docstore_core::Result<InsertedId> {
        self.pause().await;
        self.inner.insert_one(collection, document).await
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> docstore_core::Result<Vec<Document>> {
        self.pause().await;
        self.inner.find(collection, filter, options).await
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> docstore_core::Result<Option<Document>> {
        self.pause().await;
        self.inner.find_one(collection, filter).await
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> docstore_core::Result<u64> {
        self.pause().await;
        self.inner.count_documents(collection, filter).await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> docstore_core::Result<u64> {
        self.pause().await;
        self.inner.delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> docstore_core::Result<u64> {
        self.pause().await;
        self.inner.delete_many(collection, filter).await
    }

    async fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> docstore_core::Result<Vec<Document>> {
        self.pause().await;
        self.inner.aggregate(collection, pipeline).await
    }
}
