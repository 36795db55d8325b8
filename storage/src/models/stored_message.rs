//! Persisted message document.
//!
//! Maps to one document in the messages collection. Header fields are copied
//! out of the payload so the store can filter and sort on them.

use crate::models::captured_message::{CapturedMessage, EmailAddress, MessageId};
use crate::room::RoomKey;
use chrono::{DateTime, Utc};
use docstore_core::Document;
use serde::{Deserialize, Serialize};

pub(crate) const FIELD_ID: &str = "id";
pub(crate) const FIELD_ROOM: &str = "room";
pub(crate) const FIELD_DATE: &str = "date";
pub(crate) const FIELD_SUBJECT: &str = "subject";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub room: RoomKey,
    pub from: Vec<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub subject: String,
    /// Milliseconds since the epoch in the document, so ordering is numeric.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    pub message: CapturedMessage,
}

impl StoredMessage {
    /// Builds the record for `message` in `room`, parsing its headers.
    pub fn new(room: &RoomKey, message: &CapturedMessage) -> Self {
        let email = message.email();
        Self {
            id: message.id.clone(),
            room: room.clone(),
            from: email.from,
            to: email.to,
            subject: email.subject,
            date: email.date,
            message: message.clone(),
        }
    }

    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_document(document: Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(document)
    }
}
