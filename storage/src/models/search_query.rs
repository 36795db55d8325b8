//! Search parameters for listing messages.
//!
//! Used by MessagesRepo::list. Keys are free-form; only `to`, `from` and
//! `content` are recognized, anything else is ignored.

use super::stored_message::FIELD_SUBJECT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SEARCH_PARAM_TO: &str = "to";
pub const SEARCH_PARAM_FROM: &str = "from";
pub const SEARCH_PARAM_CONTENT: &str = "content";

/// Recognized search fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    /// Recipient display name or address.
    To,
    /// Sender display name or address.
    From,
    /// Subject line.
    Content,
}

impl SearchField {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            SEARCH_PARAM_TO => Some(SearchField::To),
            SEARCH_PARAM_FROM => Some(SearchField::From),
            SEARCH_PARAM_CONTENT => Some(SearchField::Content),
            _ => None,
        }
    }

    /// Document paths a term for this field is matched against.
    pub fn paths(&self) -> &'static [&'static str] {
        match self {
            SearchField::To => &["to.name", "to.address"],
            SearchField::From => &["from.name", "from.address"],
            SearchField::Content => &[FIELD_SUBJECT],
        }
    }
}

/// Search terms keyed by parameter name. Values are regular expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchQuery(BTreeMap<String, String>);

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Recognized terms only.
    pub fn terms(&self) -> impl Iterator<Item = (SearchField, &str)> {
        self.0
            .iter()
            .filter_map(|(k, v)| SearchField::from_key(k).map(|f| (f, v.as_str())))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SearchQuery {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        SearchQuery(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
