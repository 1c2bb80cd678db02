//! Message factory
//!
//! Single place where every known message id is mapped to a message instance.

use super::{
    Message, MessageBody, MSG_HEADER_ID, MSG_LOCATIONS_REQUEST_ID, MSG_LOCATIONS_RESPONSE_ID,
    MSG_ROUTE_REQUEST_ID, MSG_ROUTE_RESPONSE_ID, MSG_STATUS_REQUEST_ID, MSG_STATUS_RESPONSE_ID,
};

/// Every message id the factory can create
pub const KNOWN_MESSAGE_IDS: [u32; 7] = [
    MSG_HEADER_ID,
    MSG_STATUS_REQUEST_ID,
    MSG_STATUS_RESPONSE_ID,
    MSG_LOCATIONS_REQUEST_ID,
    MSG_LOCATIONS_RESPONSE_ID,
    MSG_ROUTE_REQUEST_ID,
    MSG_ROUTE_RESPONSE_ID,
];

/// Creates messages from their numeric id
///
/// The factory is immutable once built, so one instance can be shared by every
/// session.
#[derive(Debug, Clone)]
pub struct MessageFactory {
    max_length: usize,
}

impl MessageFactory {
    pub fn new() -> Self {
        let max_length = KNOWN_MESSAGE_IDS
            .iter()
            .filter_map(|id| MessageBody::for_id(*id))
            .map(|body| Message::new(body).length())
            .max()
            .unwrap_or_default();

        Self { max_length }
    }

    /// Create a fresh message for `id`, or None if the id is not supported
    pub fn create(&self, id: u32) -> Option<Message> {
        MessageBody::for_id(id).map(Message::new)
    }

    /// Create a bare header message
    pub fn header(&self) -> Message {
        Message::new(MessageBody::Header)
    }

    /// Length of the largest known message
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for MessageFactory {
    fn default() -> Self {
        Self::new()
    }
}
