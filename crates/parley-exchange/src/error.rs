//! Error types for the exchange layer.

use std::time::Duration;

use parley_protocol::ProtocolError;
use parley_transport::TransportError;

/// Everything a duplex operation can fail with.
///
/// Exactly one of these is returned per failed operation; the engine never
/// retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// Dial, write, or read failed. The link has already dropped the
    /// socket, so the next operation re-dials.
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    /// An envelope could not be encoded or a frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The service answered with an error frame.
    #[error("server error: {message}")]
    Server { message: String },

    /// No terminal frame arrived in time. The connection stays open.
    #[error("no reply within {after:?}")]
    Timeout { after: Duration },

    /// A caller-supplied argument was rejected before any I/O.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// The service replied, but the change did not stick (for example a pin
    /// request answered with the old pin flag).
    #[error("operation did not take effect: {0}")]
    NotApplied(String),
}
