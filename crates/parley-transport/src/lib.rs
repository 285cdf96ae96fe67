//! Transport layer for Parley.
//!
//! Two collaborators live here, both consumed through traits so the layers
//! above can be driven by in-memory doubles:
//!
//! - a **duplex-socket provider** ([`Dialer`] producing [`Connection`]s),
//!   wrapped by [`DuplexLink`] which owns the single lazily-established
//!   socket of a client;
//! - an **HTTP verb issuer** ([`HttpTransport`]) for the plain REST calls.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketDialer`] via `tokio-tungstenite`
//! - `http` (default): [`ReqwestTransport`] via `reqwest`

mod error;
mod http;
mod link;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "http")]
pub use http::ReqwestTransport;
pub use http::{HttpRequest, HttpResponse, HttpTransport, Method};
pub use link::DuplexLink;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketDialer};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a dialed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle of the client's single duplex socket.
///
/// ```text
/// Disconnected → Connecting → Connected → Closing → Disconnected
///        ↑            │            │
///        └────────────┴────────────┘  (handshake failure / fatal I/O error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

/// Where and how to open the duplex socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplexEndpoint {
    /// `ws://` or `wss://` URL of the duplex endpoint.
    pub url: String,
    /// Headers sent with the upgrade request (authorization, cookie, ...).
    pub headers: Vec<(String, String)>,
}

impl DuplexEndpoint {
    /// Creates an endpoint with no extra headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Adds one handshake header.
    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Opens duplex connections. One `dial` is one handshake.
pub trait Dialer: Send + Sync + 'static {
    /// The connection type produced by this dialer.
    type Connection: Connection;

    /// Performs the handshake against `endpoint`.
    fn dial(
        &self,
        endpoint: &DuplexEndpoint,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single connection that can send and receive frames.
pub trait Connection: Send + Sync + 'static {
    /// Sends one frame to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next data frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Sends a normal-closure control frame and shuts the socket down.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionState::Closing.to_string(), "Closing");
    }

    #[test]
    fn test_endpoint_with_header_appends_in_order() {
        let endpoint = DuplexEndpoint::new("wss://example.test/ws/")
            .with_header("User-Agent", "parley")
            .with_header("Cookie", "a=b");

        assert_eq!(endpoint.url, "wss://example.test/ws/");
        assert_eq!(
            endpoint.headers,
            vec![
                ("User-Agent".to_string(), "parley".to_string()),
                ("Cookie".to_string(), "a=b".to_string()),
            ]
        );
    }
}
