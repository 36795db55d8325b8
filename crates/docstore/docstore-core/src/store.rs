//! # Document Store
//!
//! The `DocumentStore` trait is the whole contract between the message
//! storage layer and a persistence backend. Every method names the collection
//! it operates on; collections are created implicitly on first insert.
//!
//! ## Semantics every backend must honour
//!
//! - `find` and `aggregate` evaluate exactly like [`apply_find`] and
//!   [`run_pipeline`]; backends may narrow candidates with indexes first.
//! - Documents are returned in insertion order unless sorted.
//! - Unique indexes reject a conflicting insert with
//!   [`StoreError::DuplicateKey`](crate::StoreError::DuplicateKey).
//! - `delete_one` removes the first matching document in insertion order.
//!
//! [`apply_find`]: crate::apply_find
//! [`run_pipeline`]: crate::run_pipeline

use crate::document::Document;
use crate::error::Result;
use crate::filter::Filter;
use crate::index::IndexModel;
use crate::pipeline::{FindOptions, Stage};
use async_trait::async_trait;

/// Backend-assigned identifier of an inserted document.
pub type InsertedId = i64;

/// Trait for document persistence backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates `index` on `collection` if it does not exist. Returns the index name.
    async fn create_index(&self, collection: &str, index: IndexModel) -> Result<String>;

    /// Inserts one document.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<InsertedId>;

    /// Returns matching documents, sorted and paged per `options`.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Vec<Document>>;

    /// Returns the first matching document in insertion order.
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>>;

    /// Counts matching documents.
    async fn count_documents(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Deletes at most one matching document. Returns the number deleted.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Deletes every matching document. Returns the number deleted.
    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Runs an aggregation pipeline over the collection.
    async fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> Result<Vec<Document>>;
}
