//! One page of a message listing.
//!
//! Returned by MessagesRepo::list.

use crate::models::captured_message::CapturedMessage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    /// Messages on this page, newest `date` first.
    pub messages: Vec<CapturedMessage>,
    /// Messages matching the search before paging.
    pub total: usize,
}

impl MessagePage {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
