//! Find options and aggregation stages.
//!
//! [`apply_find`] and [`run_pipeline`] are the reference evaluators shared by
//! all backends. Sorting is stable: documents that compare equal keep the
//! order in which the backend produced them (insertion order).

use crate::document::{compare_values, first_value, Document};
use crate::error::Result;
use crate::filter::{Filter, Matcher};
use serde_json::{json, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Single-field sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Descending,
        }
    }
}

/// Sort, skip and limit applied by `find`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Option<SortSpec>,
    pub skip: usize,
    /// `None` returns every remaining document.
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One step of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keeps documents matching the filter.
    Match(Filter),
    /// Collapses documents into one `{"_id": <value of key>}` per distinct value.
    Group { key: String },
    /// Replaces the input with a single `{<into>: n}` document.
    /// Produces nothing when the input is empty.
    Count { into: String },
    Sort(SortSpec),
    Skip(usize),
    Limit(usize),
}

fn sort_documents(docs: &mut [Document], spec: &SortSpec) {
    docs.sort_by(|a, b| {
        let ord = compare_values(&first_value(a, &spec.field), &first_value(b, &spec.field));
        match spec.order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
}

/// Filters, sorts and pages `docs` the way `DocumentStore::find` must.
pub fn apply_find(docs: Vec<Document>, matcher: &Matcher, options: &FindOptions) -> Vec<Document> {
    let mut matched: Vec<Document> = docs.into_iter().filter(|d| matcher.matches(d)).collect();
    if let Some(spec) = &options.sort {
        sort_documents(&mut matched, spec);
    }

    let page = matched.into_iter().skip(options.skip);
    match options.limit {
        Some(limit) => page.take(limit).collect(),
        None => page.collect(),
    }
}

/// Runs an aggregation pipeline over `docs`.
pub fn run_pipeline(docs: Vec<Document>, stages: &[Stage]) -> Result<Vec<Document>> {
    let mut current = docs;
    for stage in stages {
        current = match stage {
            Stage::Match(filter) => {
                let matcher = filter.compile()?;
                current.into_iter().filter(|d| matcher.matches(d)).collect()
            }
            Stage::Group { key } => {
                let mut seen = HashSet::new();
                let mut groups = Vec::new();
                for doc in &current {
                    let value = first_value(doc, key);
                    if seen.insert(value.to_string()) {
                        groups.push(json!({ "_id": value }));
                    }
                }
                groups
            }
            Stage::Count { into } => {
                if current.is_empty() {
                    Vec::new()
                } else {
                    let mut out = serde_json::Map::new();
                    out.insert(into.clone(), Value::from(current.len() as u64));
                    vec![Value::Object(out)]
                }
            }
            Stage::Sort(spec) => {
                sort_documents(&mut current, spec);
                current
            }
            Stage::Skip(n) => current.into_iter().skip(*n).collect(),
            Stage::Limit(n) => current.into_iter().take(*n).collect(),
        };
    }
    Ok(current)
}
