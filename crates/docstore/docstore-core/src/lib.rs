//! # docstore-core
//!
//! Core types and traits for document storage: the [`Document`] model, the
//! [`Filter`] language, aggregation [`Stage`]s, index definitions, and the
//! [`DocumentStore`] trait implemented by the storage backends.
//!
//! ## Modules
//!
//! - [`document`] – Document type, dotted-path lookup, value ordering
//! - [`filter`] – Filter expressions and their compiled [`Matcher`]
//! - [`pipeline`] – Find options and aggregation stages
//! - [`index`] – Index definitions and unique-key extraction
//! - [`store`] – The `DocumentStore` trait
//! - [`error`] – Store error types
//!
//! Backends (`docstore-inmemory`, `docstore-sqlite`) share the evaluation
//! helpers in [`filter`] and [`pipeline`] so that query semantics are identical
//! regardless of where documents live.

pub mod document;
pub mod error;
pub mod filter;
pub mod index;
pub mod pipeline;
pub mod store;


pub use document::{compare_values, first_value, lookup, Document};
pub use error::{Result, StoreError};
pub use filter::{Filter, Matcher};
pub use index::{IndexKey, IndexModel};
pub use pipeline::{apply_find, run_pipeline, FindOptions, SortOrder, SortSpec, Stage};
pub use store::{DocumentStore, InsertedId};
