//! Network module - Handles TCP communication between client and server
//!
//! Provides:
//! - Sessions running the request/response conversation over a transport
//! - Server accepting connections and running one session task per client
//! - Blocking client driving a single conversation

mod client;
mod server;
mod session;

pub use client::*;
pub use server::*;

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// Configuration for network operations
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Port to listen on or connect to
    pub port: u16,
    /// Address the server binds to
    pub bind_address: String,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds, none to wait forever
    pub read_timeout_ms: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: crate::protocol::DEFAULT_PORT,
            bind_address: "0.0.0.0".to_string(),
            connect_timeout_ms: 5000,
            read_timeout_ms: None,
        }
    }
}

impl NetworkConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn with_bind_address(mut self, bind_address: impl Into<String>) -> Self {
        self.bind_address = bind_address.into();
        self
    }

    pub fn with_read_timeout_ms(mut self, read_timeout_ms: Option<u64>) -> Self {
        self.read_timeout_ms = read_timeout_ms;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Address string the server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Resolve a hostname to a socket address
pub fn resolve_host(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;

    addrs.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}
