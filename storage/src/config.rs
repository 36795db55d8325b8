//! Storage configuration.
//! Loaded from environment variables MAILROOM_PER_ROOM_LIMIT, MAILROOM_COLLECTION,
//! MAILROOM_OPERATION_TIMEOUT_MS and MAILROOM_RETENTION; all optional.

use crate::error::{Result, StorageError};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_COLLECTION: &str = "messages";

/// How strictly the per-room limit is held under concurrent stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetentionMode {
    /// Count, flush and insert are independent store calls. Concurrent stores
    /// into one room near the limit may overshoot it, or a flush may remove a
    /// message another caller just inserted.
    #[default]
    BestEffort,
    /// Stores into the same room through one `MessageStorage` run one at a
    /// time, so the limit holds for that facade. Other processes sharing the
    /// backend are not coordinated.
    Serialized,
}

impl FromStr for RetentionMode {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "best-effort" => Ok(RetentionMode::BestEffort),
            "serialized" => Ok(RetentionMode::Serialized),
            other => Err(StorageError::Configuration(format!(
                "unknown retention mode: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Messages kept per room before the room is flushed; 0 disables the cap.
    pub per_room_limit: usize,
    /// Collection holding message documents.
    pub collection: String,
    /// Deadline applied to each backend call.
    pub operation_timeout: Option<Duration>,
    pub retention: RetentionMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            per_room_limit: 0,
            collection: DEFAULT_COLLECTION.to_string(),
            operation_timeout: None,
            retention: RetentionMode::default(),
        }
    }
}

impl StorageConfig {
    /// Defaults with the given per-room limit.
    pub fn with_per_room_limit(per_room_limit: usize) -> Self {
        Self {
            per_room_limit,
            ..Self::default()
        }
    }

    /// Loads from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads from any key/value source; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(limit) = lookup("MAILROOM_PER_ROOM_LIMIT") {
            config.per_room_limit = limit.trim().parse().map_err(|_| {
                StorageError::Configuration(format!("MAILROOM_PER_ROOM_LIMIT: bad value {}", limit))
            })?;
        }
        if let Some(collection) = lookup("MAILROOM_COLLECTION") {
            if collection.is_empty() {
                return Err(StorageError::Configuration(
                    "MAILROOM_COLLECTION is empty".to_string(),
                ));
            }
            config.collection = collection;
        }
        if let Some(ms) = lookup("MAILROOM_OPERATION_TIMEOUT_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                StorageError::Configuration(format!("MAILROOM_OPERATION_TIMEOUT_MS: bad value {}", ms))
            })?;
            config.operation_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(mode) = lookup("MAILROOM_RETENTION") {
            config.retention = mode.trim().parse()?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = StorageConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StorageConfig::default());
        assert_eq!(config.per_room_limit, 0);
        assert_eq!(config.collection, "messages");
        assert!(config.operation_timeout.is_none());
        assert_eq!(config.retention, RetentionMode::BestEffort);
    }

    #[test]
    fn test_reads_all_keys() {
        let config = StorageConfig::from_lookup(lookup(&[
            ("MAILROOM_PER_ROOM_LIMIT", "100"),
            ("MAILROOM_COLLECTION", "captured"),
            ("MAILROOM_OPERATION_TIMEOUT_MS", "2500"),
            ("MAILROOM_RETENTION", "serialized"),
        ]))
        .unwrap();
        assert_eq!(config.per_room_limit, 100);
        assert_eq!(config.collection, "captured");
        assert_eq!(config.operation_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.retention, RetentionMode::Serialized);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = StorageConfig::from_lookup(lookup(&[("MAILROOM_PER_ROOM_LIMIT", "-1")]));
        assert!(matches!(err, Err(StorageError::Configuration(_))));

        let err = StorageConfig::from_lookup(lookup(&[("MAILROOM_RETENTION", "strict")]));
        assert!(matches!(err, Err(StorageError::Configuration(_))));
    }

    #[test]
    fn test_with_per_room_limit() {
        let config = StorageConfig::with_per_room_limit(6);
        assert_eq!(config.per_room_limit, 6);
        assert_eq!(config.collection, DEFAULT_COLLECTION);
    }
}
