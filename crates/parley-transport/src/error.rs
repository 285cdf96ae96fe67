/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The duplex handshake failed (DNS, TCP, TLS, or HTTP upgrade).
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// An operation needed a live socket but the link is not connected.
    #[error("not connected")]
    NotConnected,

    /// The remote side closed the connection.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// A plain HTTP request could not be issued or its body not read.
    #[error("http request failed: {0}")]
    Http(String),
}
