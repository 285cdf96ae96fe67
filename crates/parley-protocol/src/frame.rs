//! Outgoing envelopes and incoming frames.
//!
//! ```text
//! out: {"command": "...", "origin_id": "web-next", "request_id": "...", "payload": {...}}
//! in:  {"command": "...", "payload": {...}?, "comment": "..."?, "request_id": "..."?}
//! ```
//!
//! A [`Frame`] keeps its payload as an untyped JSON value until the engine
//! knows which shape to expect; see [`Frame::payload_as`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Chat, Command, ProtocolError, Turn};

/// Origin tag the service's own web client sends.
pub const DEFAULT_ORIGIN: &str = "web-next";

/// Command tags of inbound frames the engine understands.
pub mod tag {
    /// Error frame; the message is in `comment`.
    pub const NEO_ERROR: &str = "neo_error";
    /// A new turn (payload `{turn}`).
    pub const ADD_TURN: &str = "add_turn";
    /// An existing turn changed (payload `{turn}`).
    pub const UPDATE_TURN: &str = "update_turn";
    /// Acknowledges `create_chat` (payload `{chat}`).
    pub const CREATE_CHAT_RESPONSE: &str = "create_chat_response";
    /// Generic acknowledgement.
    pub const OK: &str = "ok";
    /// Acknowledges `remove_turns`.
    pub const REMOVE_TURNS_RESPONSE: &str = "remove_turns_response";
    /// Some deployments echo the command itself as the delete ack.
    pub const REMOVE_TURNS: &str = "remove_turns";
}

// ---------------------------------------------------------------------------
// Envelope (outbound)
// ---------------------------------------------------------------------------

/// One outgoing instruction. Built per call, encoded, and dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Flattened to the top-level `command` and `payload` keys.
    #[serde(flatten)]
    pub command: Command,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
    pub request_id: String,
}

impl Envelope {
    /// Wraps `command` with the default origin tag.
    pub fn new(command: Command, request_id: impl Into<String>) -> Self {
        Self {
            command,
            origin_id: Some(DEFAULT_ORIGIN.to_owned()),
            request_id: request_id.into(),
        }
    }

    /// Replaces the origin tag.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin_id = Some(origin.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Frame (inbound)
// ---------------------------------------------------------------------------

/// One message received from the duplex socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Present only when the service echoes the originating request id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Frame {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            payload: None,
            comment: None,
            request_id: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Decodes the deferred payload as `T`. A missing payload is offered to
    /// `T` as JSON `null`.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the payload does not match `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        match &self.payload {
            Some(value) => T::deserialize(value),
            None => T::deserialize(&Value::Null),
        }
        .map_err(ProtocolError::Decode)
    }

    /// The request id this frame answers, if the service said so. Some
    /// acknowledgements carry it inside the payload instead of at the top
    /// level.
    pub fn correlation_id(&self) -> Option<&str> {
        self.request_id.as_deref().or_else(|| {
            self.payload
                .as_ref()
                .and_then(|p| p.get("request_id"))
                .and_then(Value::as_str)
        })
    }

    /// `true` for the service's error frame.
    pub fn is_error(&self) -> bool {
        self.command == tag::NEO_ERROR
    }

    /// Human-readable text of an error frame.
    pub fn error_message(&self) -> String {
        match self.comment.as_deref() {
            Some(comment) if !comment.is_empty() => comment.to_owned(),
            _ => "unspecified service error".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reply payloads
// ---------------------------------------------------------------------------

/// Payload of `add_turn` / `update_turn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReply {
    pub turn: Turn,
}

/// Payload of `create_chat_response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub chat: Chat,
}

/// Payload of the delete ack. The chat id is not always echoed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveTurnsReply {
    #[serde(default)]
    pub chat_id: Option<String>,
}
