//! Data model: captured payloads, persisted records, search terms, pages.

mod captured_message;
mod message_page;
mod search_query;
pub(crate) mod stored_message;

pub use captured_message::{CapturedMessage, Email, EmailAddress, Envelope, MessageId};
pub use message_page::MessagePage;
pub use search_query::{
    SearchField, SearchQuery, SEARCH_PARAM_CONTENT, SEARCH_PARAM_FROM, SEARCH_PARAM_TO,
};
pub use stored_message::StoredMessage;
