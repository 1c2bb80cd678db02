//! Waypoint Client
//!
//! Connects to a Waypoint server and drives one request/response
//! conversation over a blocking socket.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use thiserror::Error;

use super::session::{Session, SessionError};
use super::{resolve_host, NetworkConfig};
use crate::protocol::{Message, MessageFactory};

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Not connected")]
    NotConnected,

    #[error("Connection timeout")]
    Timeout,
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Waypoint Client
pub struct Client {
    /// Client configuration
    config: NetworkConfig,
    /// Shared message factory
    factory: Arc<MessageFactory>,
    /// Session with the server, once connected
    session: Option<Session<TcpStream>>,
}

impl Client {
    /// Create a new client
    pub fn new(config: NetworkConfig, factory: Arc<MessageFactory>) -> Self {
        Self {
            config,
            factory,
            session: None,
        }
    }

    /// Connect to `host` on the configured port
    pub fn connect(&mut self, host: &str) -> ClientResult<SocketAddr> {
        if self.session.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        let server_addr = resolve_host(host, self.config.port)?;
        tracing::info!("Connecting to {}", server_addr);

        let stream = TcpStream::connect_timeout(&server_addr, self.config.connect_timeout())
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::TimedOut => ClientError::Timeout,
                _ => ClientError::Io(e),
            })?;
        stream.set_read_timeout(self.config.read_timeout())?;
        stream.set_nodelay(true)?;

        self.session = Some(Session::new(stream, self.factory.clone()));
        tracing::info!("Connected to {}", server_addr);

        Ok(server_addr)
    }

    /// Send `initial`, then answer every received message with `handler`
    ///
    /// The conversation ends when the handler returns no response.
    pub fn run<F>(&mut self, initial: Message, mut handler: F) -> ClientResult<()>
    where
        F: FnMut(Message) -> Option<Message>,
    {
        let session = self.session.as_mut().ok_or(ClientError::NotConnected)?;

        session.send_message(&initial)?;
        loop {
            let message = session.wait_for_message()?;

            match handler(message) {
                Some(response) => {
                    session.send_message(&response)?;
                }
                None => break,
            }
        }

        let stats = session.stats();
        tracing::debug!(
            "Conversation finished. sent={} received={} bytes_sent={} bytes_received={}",
            stats.messages_sent,
            stats.messages_received,
            stats.bytes_sent,
            stats.bytes_received
        );
        Ok(())
    }

    /// Close the connection to the server
    pub fn disconnect(&mut self) -> ClientResult<()> {
        let session = self.session.take().ok_or(ClientError::NotConnected)?;
        // The peer may already have closed its side
        let _ = session.stream_ref().shutdown(std::net::Shutdown::Both);
        tracing::info!("Disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageBody;
    use std::net::TcpListener;
    use std::thread;

    fn factory() -> Arc<MessageFactory> {
        Arc::new(MessageFactory::new())
    }

    /// Serve one connection on a thread, answering with `respond`
    fn serve_once<F>(respond: F) -> (u16, thread::JoinHandle<Vec<u32>>)
    where
        F: Fn(&Message) -> Option<Message> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut session = Session::new(stream, factory());
            let mut seen = Vec::new();

            while let Ok(message) = session.wait_for_message() {
                seen.push(message.id());
                match respond(&message) {
                    Some(response) => {
                        session.send_message(&response).unwrap();
                    }
                    None => break,
                }
            }
            seen
        });

        (port, handle)
    }

    #[test]
    fn test_client_conversation() {
        let (port, server) = serve_once(|message| match message.body() {
            MessageBody::StatusRequest => Some(Message::status_response()),
            MessageBody::RouteRequest(request) => {
                Some(Message::route_response(request.start_index + request.end_index))
            }
            _ => None,
        });

        let mut client = Client::new(NetworkConfig::new(port), factory());
        client.connect("127.0.0.1").unwrap();

        let mut cost = None;
        client
            .run(Message::status_request(), |message| {
                if message.is_status_response() {
                    return Some(Message::route_request(2, 3));
                }
                cost = message.as_route_response().map(|r| r.cost);
                None
            })
            .unwrap();

        assert_eq!(cost, Some(5));

        client.disconnect().unwrap();
        assert!(matches!(client.disconnect(), Err(ClientError::NotConnected)));

        let seen = server.join().unwrap();
        assert_eq!(seen, vec![Message::status_request().id(), Message::route_request(0, 0).id()]);
    }

    #[test]
    fn test_run_without_connection() {
        let mut client = Client::new(NetworkConfig::default(), factory());

        assert!(matches!(
            client.run(Message::status_request(), |_| None),
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(client.disconnect(), Err(ClientError::NotConnected)));
    }

    #[test]
    fn test_server_closing_ends_run_with_error() {
        let (port, server) = serve_once(|_| None);

        let mut client = Client::new(NetworkConfig::new(port), factory());
        client.connect("127.0.0.1").unwrap();

        let result = client.run(Message::status_request(), |_| None);
        assert!(matches!(
            result,
            Err(ClientError::Session(SessionError::ConnectionClosed))
                | Err(ClientError::Session(SessionError::Transport(_)))
        ));

        server.join().unwrap();
    }

    #[test]
    fn test_connect_twice() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut client = Client::new(NetworkConfig::new(port), factory());
        client.connect("127.0.0.1").unwrap();

        assert!(matches!(
            client.connect("127.0.0.1"),
            Err(ClientError::AlreadyConnected)
        ));
    }
}
