//! The chat and turn model returned to callers.
//!
//! These are immutable snapshots decoded from `add_turn` / `update_turn`
//! frames and REST listings. Field names follow the service's JSON; a few
//! are renamed on the Rust side where the wire name is unhelpful
//! (`raw_content` → `text`, `safety_truncated` → `filtered`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// TurnKey
// ---------------------------------------------------------------------------

/// Composite key of a turn: the chat it lives in plus its own id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TurnKey {
    pub chat_id: String,
    pub turn_id: String,
}

impl TurnKey {
    pub fn new(chat_id: impl Into<String>, turn_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            turn_id: turn_id.into(),
        }
    }
}

impl fmt::Display for TurnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.turn_id)
    }
}

// ---------------------------------------------------------------------------
// Author / Candidate
// ---------------------------------------------------------------------------

/// Who wrote a turn.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_human: bool,
}

/// One generated response option within a turn.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Candidate {
    pub candidate_id: String,
    #[serde(rename = "raw_content", default)]
    pub text: String,
    /// `false` while the service is still streaming this candidate.
    #[serde(default)]
    pub is_final: bool,
    #[serde(rename = "safety_truncated", default)]
    pub filtered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// A single exchange unit within a chat.
///
/// Decoding enforces that a non-empty `primary_candidate_id` names one of
/// `candidates`; a frame that breaks this fails with
/// [`ProtocolError::Decode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TurnWire")]
pub struct Turn {
    pub turn_key: TurnKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub author: Author,
    pub candidates: Vec<Candidate>,
    pub primary_candidate_id: String,
    pub is_pinned: bool,
}

impl Turn {
    /// Returns the candidate currently designated as the reply.
    pub fn primary_candidate(&self) -> Option<&Candidate> {
        self.candidate(&self.primary_candidate_id)
    }

    /// Looks up a candidate by id.
    pub fn candidate(&self, candidate_id: &str) -> Option<&Candidate> {
        self.candidates
            .iter()
            .find(|c| c.candidate_id == candidate_id)
    }

    /// `true` once the primary candidate has been fully generated.
    pub fn is_final(&self) -> bool {
        self.primary_candidate().is_some_and(|c| c.is_final)
    }
}

/// Unchecked wire shape of a [`Turn`].
#[derive(Deserialize)]
struct TurnWire {
    turn_key: TurnKey,
    #[serde(default)]
    create_time: Option<String>,
    #[serde(default)]
    last_update_time: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    author: Author,
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    primary_candidate_id: String,
    #[serde(default)]
    is_pinned: bool,
}

impl TryFrom<TurnWire> for Turn {
    type Error = ProtocolError;

    fn try_from(mut wire: TurnWire) -> Result<Self, Self::Error> {
        // A lone candidate is the primary even when the service omits the id.
        if wire.primary_candidate_id.is_empty() {
            if let [only] = wire.candidates.as_slice() {
                wire.primary_candidate_id = only.candidate_id.clone();
            }
        }

        let dangling = !wire.primary_candidate_id.is_empty()
            && !wire
                .candidates
                .iter()
                .any(|c| c.candidate_id == wire.primary_candidate_id);
        if dangling {
            return Err(ProtocolError::InvalidMessage(format!(
                "turn {} names primary candidate {} which is not among its candidates",
                wire.turn_key, wire.primary_candidate_id
            )));
        }

        Ok(Turn {
            turn_key: wire.turn_key,
            create_time: wire.create_time,
            last_update_time: wire.last_update_time,
            state: wire.state,
            author: wire.author,
            candidates: wire.candidates,
            primary_candidate_id: wire.primary_candidate_id,
            is_pinned: wire.is_pinned,
        })
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A conversation between the caller and one character.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: String,
    #[serde(default)]
    pub character_id: String,
    #[serde(default)]
    pub creator_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "type", default)]
    pub chat_type: String,
    #[serde(default)]
    pub visibility: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_avatar_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preview_turns: Vec<Turn>,
}
