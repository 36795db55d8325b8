//! Canonical room keys.
//!
//! Every storage operation addresses a room through a [`RoomKey`]; an empty
//! caller-supplied room maps to [`DEFAULT_ROOM`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key used when the caller supplies no room.
pub const DEFAULT_ROOM: &str = "_default";

/// Normalized, never-empty room identifier.
///
/// Serialized as a plain string; deserializing an empty string gives the default key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RoomKey(String);

impl RoomKey {
    /// Returns `raw` as a key, or the default key when `raw` is empty.
    pub fn normalize(raw: &str) -> Self {
        if raw.is_empty() {
            RoomKey(DEFAULT_ROOM.to_string())
        } else {
            RoomKey(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_ROOM
    }
}

impl Default for RoomKey {
    fn default() -> Self {
        RoomKey(DEFAULT_ROOM.to_string())
    }
}

impl From<&str> for RoomKey {
    fn from(raw: &str) -> Self {
        RoomKey::normalize(raw)
    }
}

impl From<String> for RoomKey {
    fn from(raw: String) -> Self {
        if raw.is_empty() {
            RoomKey::default()
        } else {
            RoomKey(raw)
        }
    }
}

impl From<RoomKey> for String {
    fn from(key: RoomKey) -> Self {
        key.0
    }
}

impl AsRef<str> for RoomKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
