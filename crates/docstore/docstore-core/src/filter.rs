//! Filter expressions.
//!
//! A [`Filter`] is plain data that callers build and backends receive. Before
//! evaluation it is compiled into a [`Matcher`], which validates and caches the
//! regular expressions it contains.

use crate::document::{lookup, Document};
use crate::error::{Result, StoreError};
use regex::Regex;
use serde_json::Value;

/// Query predicate over documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    /// Some value at `field` equals `value`.
    Eq { field: String, value: Value },
    /// Some string at `field` matches `pattern` (unanchored, case-sensitive).
    Regex { field: String, pattern: String },
    /// Every sub-filter matches. An empty list matches everything.
    And(Vec<Filter>),
    /// At least one sub-filter matches. An empty list matches nothing.
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Regex {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    /// Compiles the filter, rejecting invalid regular expressions.
    pub fn compile(&self) -> Result<Matcher> {
        Ok(match self {
            Filter::All => Matcher::All,
            Filter::Eq { field, value } => Matcher::Eq(field.clone(), value.clone()),
            Filter::Regex { field, pattern } => {
                let regex = Regex::new(pattern).map_err(|e| {
                    StoreError::InvalidQuery(format!("bad pattern for {}: {}", field, e))
                })?;
                Matcher::Regex(field.clone(), regex)
            }
            Filter::And(filters) => Matcher::And(
                filters
                    .iter()
                    .map(Filter::compile)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Filter::Or(filters) => Matcher::Or(
                filters
                    .iter()
                    .map(Filter::compile)
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }

    /// Clauses that must all hold, with nested `And`s flattened.
    ///
    /// A filter that is not an `And` is its own single clause. Backends use
    /// this to evaluate some clauses natively and the rest per document.
    pub fn conjuncts(&self) -> Vec<&Filter> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts<'a>(&'a self, out: &mut Vec<&'a Filter>) {
        match self {
            Filter::And(filters) => {
                for filter in filters {
                    filter.collect_conjuncts(out);
                }
            }
            other => out.push(other),
        }
    }
}

/// Compiled, ready-to-evaluate form of a [`Filter`].
#[derive(Debug, Clone)]
pub enum Matcher {
    All,
    Eq(String, Value),
    Regex(String, Regex),
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
}

impl Matcher {
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Matcher::All => true,
            Matcher::Eq(field, expected) => lookup(doc, field).into_iter().any(|v| v == expected),
            Matcher::Regex(field, regex) => lookup(doc, field)
                .into_iter()
                .any(|v| v.as_str().is_some_and(|s| regex.is_match(s))),
            Matcher::And(matchers) => matchers.iter().all(|m| m.matches(doc)),
            Matcher::Or(matchers) => matchers.iter().any(|m| m.matches(doc)),
        }
    }
}
