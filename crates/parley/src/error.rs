//! Unified error type for Parley.

use std::time::Duration;

use parley_exchange::ExchangeError;
use parley_protocol::ProtocolError;
use parley_session::SessionError;
use parley_transport::TransportError;

/// The single error type callers of [`Client`](crate::Client) match on.
///
/// Engine errors are flattened onto the same variants rather than nested,
/// so a server error is `ParleyError::Server` whether it came from an error
/// frame or a REST error envelope.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// Dial, read, write, or HTTP transport failure.
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    /// Malformed data crossing the wire boundary.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The service reported an error; the message is passed through.
    #[error("server error: {message}")]
    Server { message: String },

    /// No terminal frame within the reply timeout.
    #[error("no reply within {after:?}")]
    Timeout { after: Duration },

    /// A caller-supplied argument was rejected before any I/O.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// The service replied but the change did not take effect.
    #[error("operation did not take effect: {0}")]
    NotApplied(String),

    /// Missing or rejected credentials.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ParleyError {
    pub(crate) fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }
}

impl From<ExchangeError> for ParleyError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Connection(e) => Self::Connection(e),
            ExchangeError::Protocol(e) => Self::Protocol(e),
            ExchangeError::Server { message } => Self::Server { message },
            ExchangeError::Timeout { after } => Self::Timeout { after },
            ExchangeError::Validation(msg) => Self::Validation(msg),
            ExchangeError::NotApplied(msg) => Self::NotApplied(msg),
        }
    }
}
