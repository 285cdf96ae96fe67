//! Codec trait and the JSON implementation.
//!
//! The engine never calls `serde_json` directly; it goes through a [`Codec`]
//! so a test (or a future binary framing) can swap the strategy without
//! touching the exchange logic.

use serde::{de::DeserializeOwned, Serialize};

use crate::{Envelope, Frame, ProtocolError};

/// Encodes Rust values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because the codec lives inside a client that
/// may be shared across Tokio tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do not
    /// match `T`.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;

    /// Encodes one outgoing [`Envelope`].
    fn encode_envelope(
        &self,
        envelope: &Envelope,
    ) -> Result<Vec<u8>, ProtocolError> {
        self.encode(envelope)
    }

    /// Decodes one incoming [`Frame`], leaving its payload untyped.
    fn decode_frame(&self, data: &[u8]) -> Result<Frame, ProtocolError> {
        self.decode(data)
    }
}

/// A [`Codec`] backed by `serde_json`. The service speaks JSON text frames.
///
/// ```rust
/// use parley_protocol::{Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let frame = codec
///     .decode_frame(br#"{"command":"neo_error","comment":"no such chat"}"#)
///     .unwrap();
/// assert_eq!(frame.command, "neo_error");
/// assert_eq!(frame.comment.as_deref(), Some("no such chat"));
/// assert!(frame.payload.is_none());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
