//! Captured message payload and its parsed header view.
//!
//! A [`CapturedMessage`] is what the capture service hands to storage: its own
//! identifier, the SMTP envelope, and the raw RFC 5322 text. [`Email`] is the
//! header view storage indexes for search and ordering.

use chrono::{DateTime, Utc};
use mailparse::{MailAddr, MailHeaderMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier chosen by the capture service; unique within a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        MessageId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        MessageId(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        MessageId(id)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SMTP envelope as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub helo: String,
    pub mail_from: String,
    pub rcpt_to: Vec<String>,
}

/// Mailbox from an address header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name; empty when the header has none.
    pub name: String,
    pub address: String,
}

impl EmailAddress {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Header fields of a captured message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: Vec<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub subject: String,
    /// The message's own `Date` header, not the time it was stored.
    pub date: DateTime<Utc>,
}

impl Default for Email {
    fn default() -> Self {
        Self {
            from: Vec::new(),
            to: Vec::new(),
            subject: String::new(),
            date: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// A message as captured by the mail service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedMessage {
    pub id: MessageId,
    #[serde(default)]
    pub envelope: Envelope,
    /// Raw message (headers and body) exactly as received, when available.
    /// Not necessarily UTF-8: 8-bit bodies and legacy charsets are kept as is.
    #[serde(default, with = "base64_origin")]
    pub origin: Option<Vec<u8>>,
}

/// Raw bytes as a standard base64 string, so any octets survive JSON.
mod base64_origin {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(origin: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match origin {
            Some(bytes) => serializer.serialize_some(&general_purpose::STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| {
                general_purpose::STANDARD
                    .decode(text)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}

impl CapturedMessage {
    pub fn new(id: impl Into<MessageId>) -> Self {
        Self {
            id: id.into(),
            envelope: Envelope::default(),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<Vec<u8>>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = envelope;
        self
    }

    /// Parses the header view of `origin`.
    ///
    /// Never fails: a missing origin or unparsable headers give an empty
    /// [`Email`], and individual unparsable headers fall back to defaults.
    pub fn email(&self) -> Email {
        let Some(origin) = &self.origin else {
            return Email::default();
        };
        let Ok((headers, _)) = mailparse::parse_headers(origin) else {
            return Email::default();
        };

        let addresses = |name: &str| -> Vec<EmailAddress> {
            headers
                .get_first_header(name)
                .and_then(|h| mailparse::addrparse_header(h).ok())
                .map(|list| {
                    list.iter()
                        .flat_map(|addr| match addr {
                            MailAddr::Single(info) => vec![info.clone()],
                            MailAddr::Group(group) => group.addrs.clone(),
                        })
                        .map(|info| EmailAddress {
                            name: info.display_name.unwrap_or_default(),
                            address: info.addr,
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        let date = headers
            .get_first_value("Date")
            .and_then(|d| mailparse::dateparse(&d).ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Email {
            from: addresses("From"),
            to: addresses("To"),
            subject: headers.get_first_value("Subject").unwrap_or_default(),
            date,
        }
    }
}
