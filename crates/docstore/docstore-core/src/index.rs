//! Index definitions.

use crate::document::{first_value, Document};
use crate::pipeline::SortOrder;
use serde_json::Value;

/// One key of a (possibly compound) index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub field: String,
    pub order: SortOrder,
}

/// Index over one or more fields of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexModel {
    pub keys: Vec<IndexKey>,
    pub unique: bool,
}

impl IndexModel {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            unique: false,
        }
    }

    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.keys.push(IndexKey {
            field: field.into(),
            order: SortOrder::Ascending,
        });
        self
    }

    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.keys.push(IndexKey {
            field: field.into(),
            order: SortOrder::Descending,
        });
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Conventional name: `field_dir` pairs joined by `_`, e.g. `room_-1_id_1`.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|k| {
                let dir = match k.order {
                    SortOrder::Ascending => "1",
                    SortOrder::Descending => "-1",
                };
                format!("{}_{}", k.field, dir)
            })
            .collect::<Vec<_>>()
            .join("_")
    }

    /// The tuple of indexed values for `doc`; missing fields are `null`.
    pub fn key_of(&self, doc: &Document) -> Vec<Value> {
        self.keys.iter().map(|k| first_value(doc, &k.field)).collect()
    }
}

impl Default for IndexModel {
    fn default() -> Self {
        Self::new()
    }
}
