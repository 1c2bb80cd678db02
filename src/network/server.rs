//! Waypoint Server
//!
//! The server accepts connections from clients and runs each conversation
//! as an independent task, answering requests through a shared handler.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::Instrument;
use uuid::Uuid;

use super::session::{Session, SessionResult};
use super::NetworkConfig;
use crate::protocol::{Message, MessageFactory};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bind failed: {0}")]
    BindFailed(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Answers one received message, returning None to end the session
pub type MessageHandler = Arc<dyn Fn(Message) -> Option<Message> + Send + Sync>;

/// Waypoint Server
pub struct Server {
    /// Server configuration
    config: NetworkConfig,
    /// Message factory shared by every session
    factory: Arc<MessageFactory>,
    /// Request handler shared by every session
    handler: MessageHandler,
    /// Bound listener
    listener: TcpListener,
}

impl Server {
    /// Bind to the configured address
    pub async fn bind(
        config: NetworkConfig,
        factory: Arc<MessageFactory>,
        handler: MessageHandler,
    ) -> ServerResult<Self> {
        let bind_addr = config.bind_addr();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            ServerError::BindFailed(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        Ok(Self {
            config,
            factory,
            handler,
            listener,
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until accepting fails
    pub async fn run(self) -> ServerResult<()> {
        tracing::info!("Server listening on {}", self.local_addr()?);
        let read_timeout = self.config.read_timeout();

        loop {
            let (stream, addr) = self.listener.accept().await.map_err(|e| {
                tracing::error!("Accept error: {}", e);
                e
            })?;
            tracing::info!("New connection from {}", addr);

            let factory = self.factory.clone();
            let handler = self.handler.clone();
            let span = tracing::info_span!("session", id = %Uuid::new_v4(), peer = %addr);

            tokio::spawn(
                async move {
                    if let Err(e) = handle_client(stream, factory, handler, read_timeout).await {
                        tracing::error!("Session error: {}", e);
                    }
                    tracing::info!("Session with {} ended", addr);
                }
                .instrument(span),
            );
        }
    }
}

/// Run one conversation to completion
async fn handle_client(
    stream: TcpStream,
    factory: Arc<MessageFactory>,
    handler: MessageHandler,
    read_timeout: Option<Duration>,
) -> SessionResult<()> {
    stream.set_nodelay(true)?;
    let mut session = Session::new(stream, factory).with_read_timeout(read_timeout);

    let result = session.async_wait_for_message(|message| handler(message)).await;

    let stats = session.stats();
    tracing::debug!(
        "Session stats. sent={} received={} bytes_sent={} bytes_received={}",
        stats.messages_sent,
        stats.messages_received,
        stats.bytes_sent,
        stats.bytes_received
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Client;
    use crate::protocol::MessageBody;

    fn echo_handler() -> MessageHandler {
        Arc::new(|message: Message| match message.body() {
            MessageBody::StatusRequest => Some(Message::status_response()),
            MessageBody::RouteRequest(request) => {
                Some(Message::route_response(request.end_index - request.start_index))
            }
            _ => None,
        })
    }

    async fn start_server() -> u16 {
        let config = NetworkConfig::new(0).with_bind_address("127.0.0.1");
        let server = Server::bind(config, Arc::new(MessageFactory::new()), echo_handler())
            .await
            .unwrap();
        let port = server.local_addr().unwrap().port();

        tokio::spawn(server.run());
        port
    }

    fn route_cost(port: u16, start: u64, end: u64) -> Option<u64> {
        let mut client = Client::new(NetworkConfig::new(port), Arc::new(MessageFactory::new()));
        client.connect("127.0.0.1").unwrap();

        let mut cost = None;
        client
            .run(Message::status_request(), |message| {
                if message.is_status_response() {
                    return Some(Message::route_request(start, end));
                }
                cost = message.as_route_response().map(|r| r.cost);
                None
            })
            .unwrap();
        cost
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let config = NetworkConfig::new(port).with_bind_address("127.0.0.1");
        let result = Server::bind(config, Arc::new(MessageFactory::new()), echo_handler()).await;

        assert!(matches!(result, Err(ServerError::BindFailed(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_server_conversation() {
        let port = start_server().await;

        let cost = tokio::task::spawn_blocking(move || route_cost(port, 3, 10))
            .await
            .unwrap();

        assert_eq!(cost, Some(7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_sessions() {
        let port = start_server().await;

        let clients: Vec<_> = (0..4u64)
            .map(|i| tokio::task::spawn_blocking(move || route_cost(port, i, 10 + i * 2)))
            .collect();

        for (i, client) in clients.into_iter().enumerate() {
            assert_eq!(client.await.unwrap(), Some(10 + i as u64));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_session_leaves_server_running() {
        use std::io::{Read, Write};

        let port = start_server().await;

        let answer = tokio::task::spawn_blocking(move || {
            let mut bytes = Message::status_request().serialize().to_vec();
            bytes[0..4].copy_from_slice(&999u32.to_be_bytes());

            let mut stream = std::net::TcpStream::connect(("127.0.0.1", port)).unwrap();
            stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
            stream.write_all(&bytes).unwrap();

            // The server drops the connection without answering
            let mut answer = Vec::new();
            let _ = stream.read_to_end(&mut answer);
            answer
        })
        .await
        .unwrap();
        assert!(answer.is_empty());

        let cost = tokio::task::spawn_blocking(move || route_cost(port, 3, 10))
            .await
            .unwrap();
        assert_eq!(cost, Some(7));
    }
}
