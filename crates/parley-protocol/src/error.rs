//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes crossing the wire boundary did
//! not match the contract: either an outgoing value could not be written or
//! an incoming frame did not have the expected shape.

/// Errors that can occur while encoding envelopes or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of an outgoing value failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Incoming bytes or a deferred payload did not decode.
    ///
    /// Common causes: malformed JSON, missing required fields, or a turn
    /// whose primary candidate id names no candidate.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The data decoded but breaks a protocol rule, such as a pagination
    /// cursor that repeats.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
