//! Session handling for Waypoint
//!
//! A session owns one connected transport and runs the request/response
//! conversation over it:
//! - Blocking receive/send for synchronous callers
//! - An asynchronous receive, dispatch, respond loop for the server
//! - Per-session statistics

use bytes::BytesMut;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::{CodecError, MatchStatus, Message, MessageFactory, MessageMatcher};

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("Connection closed")]
    ConnectionClosed,
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Session statistics
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Messages sent
    pub messages_sent: u64,
    /// Messages received
    pub messages_received: u64,
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
}

/// One conversation over a connected transport
///
/// `S` is a blocking `Read + Write` stream for [`wait_for_message`](Self::wait_for_message)
/// and [`send_message`](Self::send_message), or a tokio `AsyncRead + AsyncWrite`
/// stream for [`async_wait_for_message`](Self::async_wait_for_message) and
/// [`async_send_message`](Self::async_send_message).
pub struct Session<S> {
    /// The transport
    stream: S,
    /// Shared message factory
    factory: Arc<MessageFactory>,
    /// Bytes received past the end of the previous message
    pending: BytesMut,
    /// Read timeout for the async receive loop
    read_timeout: Option<Duration>,
    /// Statistics
    stats: SessionStats,
}

impl<S> Session<S> {
    pub fn new(stream: S, factory: Arc<MessageFactory>) -> Self {
        Self {
            stream,
            factory,
            pending: BytesMut::new(),
            read_timeout: None,
            stats: SessionStats::default(),
        }
    }

    /// Fail async reads that take longer than `timeout`
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Get session statistics
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Get the underlying stream
    pub fn stream_ref(&self) -> &S {
        &self.stream
    }

    fn matcher(&self) -> MessageMatcher {
        MessageMatcher::new(self.factory.clone())
    }

    fn read_buffer(&self) -> Vec<u8> {
        vec![0u8; self.factory.max_length()]
    }

    /// Feed bytes left over from the previous message, if any
    fn replay_pending(&mut self, matcher: &mut MessageMatcher) -> SessionResult<Option<Message>> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        let pending = self.pending.split();
        self.accept_chunk(matcher, &pending)
    }

    fn accept_chunk(
        &mut self,
        matcher: &mut MessageMatcher,
        chunk: &[u8],
    ) -> SessionResult<Option<Message>> {
        match matcher.process(chunk) {
            MatchStatus::Incomplete => Ok(None),
            MatchStatus::Complete { consumed } => {
                self.pending.extend_from_slice(&chunk[consumed..]);
                let message = matcher.take_message();
                if let Some(message) = &message {
                    self.stats.messages_received += 1;
                    tracing::debug!("Received message id={} length={}", message.id(), message.length());
                }
                Ok(message)
            }
            MatchStatus::Rejected(err) => Err(err.into()),
        }
    }

    fn record_sent(&mut self, message: &Message, bytes: usize) {
        self.stats.messages_sent += 1;
        self.stats.bytes_sent += bytes as u64;
        tracing::debug!("Sent message id={} length={}", message.id(), bytes);
    }
}

impl<S: Read + Write> Session<S> {
    /// Block until a complete message has been received
    pub fn wait_for_message(&mut self) -> SessionResult<Message> {
        let mut matcher = self.matcher();
        if let Some(message) = self.replay_pending(&mut matcher)? {
            return Ok(message);
        }

        let mut buf = self.read_buffer();
        loop {
            let n = match self.stream.read(&mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // A socket read timeout surfaces as WouldBlock on some platforms
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out").into())
                }
                Err(e) => return Err(e.into()),
            };

            if n == 0 {
                return Err(SessionError::ConnectionClosed);
            }

            self.stats.bytes_received += n as u64;
            if let Some(message) = self.accept_chunk(&mut matcher, &buf[..n])? {
                return Ok(message);
            }
        }
    }

    /// Send a message, returning the number of bytes written
    pub fn send_message(&mut self, message: &Message) -> SessionResult<usize> {
        let bytes = message.serialize();

        self.stream.write_all(&bytes)?;
        self.stream.flush()?;

        self.record_sent(message, bytes.len());
        Ok(bytes.len())
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Receive messages and answer them until the conversation ends
    ///
    /// Each received message is passed to `handler`. A returned response is
    /// sent back and the session waits for the next message; `None` ends the
    /// session. The session also ends cleanly if the peer closes the
    /// connection between messages.
    pub async fn async_wait_for_message<F>(&mut self, mut handler: F) -> SessionResult<()>
    where
        F: FnMut(Message) -> Option<Message>,
    {
        loop {
            let Some(request) = self.async_receive().await? else {
                tracing::debug!("Peer closed the connection");
                return Ok(());
            };

            match handler(request) {
                Some(response) => {
                    self.async_send_message(&response).await?;
                }
                None => {
                    tracing::debug!("No response produced, ending session");
                    return Ok(());
                }
            }
        }
    }

    /// Send a message, returning the number of bytes written
    pub async fn async_send_message(&mut self, message: &Message) -> SessionResult<usize> {
        let bytes = message.serialize();

        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;

        self.record_sent(message, bytes.len());
        Ok(bytes.len())
    }

    /// Receive one message, or None if the peer closed before sending any byte of it
    async fn async_receive(&mut self) -> SessionResult<Option<Message>> {
        let mut matcher = self.matcher();
        if let Some(message) = self.replay_pending(&mut matcher)? {
            return Ok(Some(message));
        }

        let mut buf = self.read_buffer();
        loop {
            let n = self.read_chunk(&mut buf).await?;

            if n == 0 {
                if matcher.total_bytes() == 0 {
                    return Ok(None);
                }
                return Err(SessionError::ConnectionClosed);
            }

            self.stats.bytes_received += n as u64;
            if let Some(message) = self.accept_chunk(&mut matcher, &buf[..n])? {
                return Ok(Some(message));
            }
        }
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> SessionResult<usize> {
        let timeout = self.read_timeout;
        let read = self.stream.read(buf);

        let n = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read timed out"))??,
            None => read.await?,
        };
        Ok(n)
    }
}
