//! # In-Memory Document Store
//!
//! In-memory implementation of the [`DocumentStore`] trait, for tests and
//! development.
//!
//! **Advantages**:
//! - No I/O, nothing to set up
//! - Same filter and pipeline semantics as every other backend
//!
//! **Limitations**:
//! - Data is lost on restart
//! - Every query scans the whole collection
//!
//! ## Thread Safety
//!
//! Collections live behind one `Arc<RwLock<>>`; each trait call takes the lock
//! once, so single calls are atomic with respect to each other. Sequences of
//! calls are not.

use async_trait::async_trait;
use docstore_core::{
    apply_find, run_pipeline, Document, DocumentStore, Filter, FindOptions, IndexModel,
    InsertedId, Result, Stage, StoreError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Collection {
    next_id: InsertedId,
    documents: Vec<(InsertedId, Document)>,
    indexes: Vec<IndexModel>,
}

impl Collection {
    fn violates_unique(&self, index: &IndexModel, doc: &Document) -> bool {
        let key = index.key_of(doc);
        self.documents.iter().any(|(_, existing)| index.key_of(existing) == key)
    }
}

/// In-memory document store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, |c| c.documents.len())
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    /// Drops every collection, including index definitions.
    pub async fn clear(&self) {
        let mut collections = self.collections.write().await;
        collections.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create_index(&self, collection: &str, index: IndexModel) -> Result<String> {
        let name = index.name();
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();

        if coll.indexes.iter().any(|existing| existing.keys == index.keys) {
            return Ok(name);
        }

        if index.unique {
            let keys: Vec<_> = coll.documents.iter().map(|(_, d)| index.key_of(d)).collect();
            for (i, key) in keys.iter().enumerate() {
                if keys[..i].contains(key) {
                    return Err(StoreError::DuplicateKey(format!(
                        "cannot build unique index {} on {}",
                        name, collection
                    )));
                }
            }
        }

        coll.indexes.push(index);
        debug!("Created index {} on {}", name, collection);
        Ok(name)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<InsertedId> {
        if !document.is_object() {
            return Err(StoreError::InvalidQuery(
                "document must be a JSON object".to_string(),
            ));
        }

        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();

        if let Some(index) = coll
            .indexes
            .iter()
            .find(|index| index.unique && coll.violates_unique(index, &document))
        {
            return Err(StoreError::DuplicateKey(format!(
                "{} on {}",
                index.name(),
                collection
            )));
        }

        coll.next_id += 1;
        let id = coll.next_id;
        coll.documents.push((id, document));
        Ok(id)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Vec<Document>> {
        let matcher = filter.compile()?;
        let collections = self.collections.read().await;
        let docs = collections
            .get(collection)
            .map(|c| c.documents.iter().map(|(_, d)| d.clone()).collect())
            .unwrap_or_default();
        Ok(apply_find(docs, &matcher, &options))
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        let matcher = filter.compile()?;
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| {
            c.documents
                .iter()
                .find(|(_, d)| matcher.matches(d))
                .map(|(_, d)| d.clone())
        }))
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let matcher = filter.compile()?;
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, |c| {
            c.documents.iter().filter(|(_, d)| matcher.matches(d)).count() as u64
        }))
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let matcher = filter.compile()?;
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match coll.documents.iter().position(|(_, d)| matcher.matches(d)) {
            Some(pos) => {
                coll.documents.remove(pos);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let matcher = filter.compile()?;
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = coll.documents.len();
        coll.documents.retain(|(_, d)| !matcher.matches(d));
        Ok((before - coll.documents.len()) as u64)
    }

    async fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> Result<Vec<Document>> {
        let docs = {
            let collections = self.collections.read().await;
            collections
                .get(collection)
                .map(|c| c.documents.iter().map(|(_, d)| d.clone()).collect())
                .unwrap_or_default()
        };
        run_pipeline(docs, pipeline)
    }
}
