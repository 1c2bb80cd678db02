//! Incremental message matching
//!
//! Accumulates bytes as they arrive from a transport and decides when a
//! complete message has been received.

use bytes::BytesMut;
use std::sync::Arc;
use thiserror::Error;

use super::{Message, MessageFactory, HEADER_SIZE};

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unknown message type: {0}")]
    UnknownMessageType(u32),

    #[error("Length mismatch for message {id}: declared {declared} bytes, expected {expected}")]
    LengthMismatch {
        id: u32,
        declared: usize,
        expected: usize,
    },
}

/// Result of feeding a chunk to a [`MessageMatcher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStatus {
    /// More bytes are needed
    Incomplete,
    /// A full message was decoded; `consumed` bytes of the last chunk belong to it
    Complete { consumed: usize },
    /// The bytes can never form a supported message
    Rejected(CodecError),
}

#[derive(Debug, Default)]
enum MatchState {
    #[default]
    AwaitingHeader,
    AwaitingBody {
        message: Message,
    },
    Complete {
        message: Message,
    },
    Rejected(CodecError),
}

/// Finds one message in a growing byte stream
///
/// Feed it chunks of any size with [`process`](Self::process). The header is
/// decoded as soon as enough bytes are present, the concrete message is then
/// created through the factory, and the match completes once the declared
/// length has arrived. An unknown id rejects the matcher for good.
pub struct MessageMatcher {
    factory: Arc<MessageFactory>,
    buffer: BytesMut,
    total_bytes: usize,
    state: MatchState,
}

impl MessageMatcher {
    pub fn new(factory: Arc<MessageFactory>) -> Self {
        let capacity = factory.max_length();
        Self {
            factory,
            buffer: BytesMut::with_capacity(capacity),
            total_bytes: 0,
            state: MatchState::AwaitingHeader,
        }
    }

    /// Feed the next chunk of received bytes
    pub fn process(&mut self, chunk: &[u8]) -> MatchStatus {
        match &self.state {
            MatchState::Complete { .. } => return MatchStatus::Complete { consumed: 0 },
            MatchState::Rejected(err) => return MatchStatus::Rejected(err.clone()),
            _ => {}
        }

        let previous = self.buffer.len();
        self.buffer.extend_from_slice(chunk);
        self.total_bytes += chunk.len();

        loop {
            match std::mem::take(&mut self.state) {
                MatchState::AwaitingHeader => {
                    if self.buffer.len() < HEADER_SIZE {
                        return MatchStatus::Incomplete;
                    }

                    let mut header = self.factory.header();
                    header.deserialize(&self.buffer);

                    let Some(message) = self.factory.create(header.id()) else {
                        tracing::warn!("Rejecting message with unknown id {}", header.id());
                        return self.reject(CodecError::UnknownMessageType(header.id()));
                    };

                    if header.length() != message.length() {
                        return self.reject(CodecError::LengthMismatch {
                            id: header.id(),
                            declared: header.length(),
                            expected: message.length(),
                        });
                    }

                    self.state = MatchState::AwaitingBody { message };
                }
                MatchState::AwaitingBody { mut message } => {
                    let length = message.length();
                    if self.buffer.len() < length {
                        self.state = MatchState::AwaitingBody { message };
                        return MatchStatus::Incomplete;
                    }

                    message.deserialize(&self.buffer[..length]);
                    self.state = MatchState::Complete { message };
                    return MatchStatus::Complete {
                        consumed: length - previous,
                    };
                }
                state @ (MatchState::Complete { .. } | MatchState::Rejected(_)) => {
                    // Handled before buffering
                    self.state = state;
                    return MatchStatus::Incomplete;
                }
            }
        }
    }

    fn reject(&mut self, err: CodecError) -> MatchStatus {
        self.state = MatchState::Rejected(err.clone());
        MatchStatus::Rejected(err)
    }

    /// Take the matched message and reset for the next one
    pub fn take_message(&mut self) -> Option<Message> {
        match std::mem::take(&mut self.state) {
            MatchState::Complete { message } => {
                self.buffer.clear();
                self.total_bytes = 0;
                Some(message)
            }
            state => {
                self.state = state;
                None
            }
        }
    }

    /// Total bytes fed since the last reset
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}
