//! Outgoing commands and their payloads.
//!
//! [`Command`] is a closed enum with one payload struct per command, so the
//! exchange engine's dispatch is checked by the compiler. Serialized, it is
//! adjacently tagged: `{"command": "<snake_case name>", "payload": {...}}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::TurnKey;

/// Every command the duplex endpoint accepts from this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "snake_case")]
pub enum Command {
    CreateAndGenerateTurn(CreateAndGenerateTurn),
    CreateChat(CreateChat),
    GenerateTurnCandidate(GenerateTurnCandidate),
    EditTurnCandidate(EditTurnCandidate),
    UpdatePrimaryCandidate(UpdatePrimaryCandidate),
    RemoveTurns(RemoveTurns),
    SetTurnPin(SetTurnPin),
}

impl Command {
    /// The wire tag of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateAndGenerateTurn(_) => "create_and_generate_turn",
            Self::CreateChat(_) => "create_chat",
            Self::GenerateTurnCandidate(_) => "generate_turn_candidate",
            Self::EditTurnCandidate(_) => "edit_turn_candidate",
            Self::UpdatePrimaryCandidate(_) => "update_primary_candidate",
            Self::RemoveTurns(_) => "remove_turns",
            Self::SetTurnPin(_) => "set_turn_pin",
        }
    }
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

const ANNOTATION_LABELS: [&str; 22] = [
    "bad_memory",
    "boring",
    "ends_chat_early",
    "funny",
    "helpful",
    "inaccurate",
    "interesting",
    "long",
    "not_bad_memory",
    "not_boring",
    "not_ends_chat_early",
    "not_funny",
    "not_helpful",
    "not_inaccurate",
    "not_interesting",
    "not_long",
    "not_out_of_character",
    "not_repetitive",
    "not_short",
    "out_of_character",
    "repetitive",
    "short",
];

/// Feedback counters attached to generation requests. The service expects
/// the full label set even when every count is zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviousAnnotations(pub BTreeMap<String, u32>);

impl Default for PreviousAnnotations {
    fn default() -> Self {
        Self(
            ANNOTATION_LABELS
                .iter()
                .map(|label| ((*label).to_owned(), 0))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Author block of a turn the client creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDraft {
    pub author_id: String,
    pub is_human: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// A candidate the client supplies (the user's own message text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDraft {
    pub candidate_id: String,
    pub raw_content: String,
}

/// The user turn carried by [`CreateAndGenerateTurn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnDraft {
    pub author: AuthorDraft,
    pub candidates: Vec<CandidateDraft>,
    pub primary_candidate_id: String,
    pub turn_key: TurnKey,
}

/// `create_and_generate_turn`: post a user message and ask the character to
/// reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAndGenerateTurn {
    pub character_id: String,
    pub num_candidates: u32,
    pub previous_annotations: PreviousAnnotations,
    pub selected_language: String,
    pub tts_enabled: bool,
    pub turn: TurnDraft,
    pub user_name: String,
}

impl CreateAndGenerateTurn {
    /// Builds a single-candidate user turn with the service's defaults.
    pub fn user_message(
        character_id: impl Into<String>,
        turn_key: TurnKey,
        author: AuthorDraft,
        candidate_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let candidate_id = candidate_id.into();
        let user_name = author.name.clone();
        Self {
            character_id: character_id.into(),
            num_candidates: 1,
            previous_annotations: PreviousAnnotations::default(),
            selected_language: String::new(),
            tts_enabled: false,
            turn: TurnDraft {
                author,
                candidates: vec![CandidateDraft {
                    candidate_id: candidate_id.clone(),
                    raw_content: text.into(),
                }],
                primary_candidate_id: candidate_id,
                turn_key,
            },
            user_name,
        }
    }
}

/// Chat block of [`CreateChat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatDraft {
    pub chat_id: String,
    pub creator_id: String,
    pub visibility: String,
    pub character_id: String,
    #[serde(rename = "type")]
    pub chat_type: String,
}

impl ChatDraft {
    /// A private one-on-one chat, the only kind this client creates.
    pub fn one_on_one(
        chat_id: impl Into<String>,
        creator_id: impl Into<String>,
        character_id: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            creator_id: creator_id.into(),
            visibility: "VISIBILITY_PRIVATE".into(),
            character_id: character_id.into(),
            chat_type: "TYPE_ONE_ON_ONE".into(),
        }
    }
}

/// `create_chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChat {
    pub chat: ChatDraft,
    pub with_greeting: bool,
}

/// `generate_turn_candidate`: ask for an alternate reply on an existing
/// turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateTurnCandidate {
    pub character_id: String,
    pub tts_enabled: bool,
    pub previous_annotations: PreviousAnnotations,
    pub selected_language: String,
    pub user_name: String,
    pub turn_key: TurnKey,
}

impl GenerateTurnCandidate {
    pub fn new(
        character_id: impl Into<String>,
        turn_key: TurnKey,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            character_id: character_id.into(),
            tts_enabled: false,
            previous_annotations: PreviousAnnotations::default(),
            selected_language: String::new(),
            user_name: user_name.into(),
            turn_key,
        }
    }
}

/// `edit_turn_candidate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditTurnCandidate {
    pub turn_key: TurnKey,
    pub current_candidate_id: String,
    pub new_candidate_raw_content: String,
}

/// `update_primary_candidate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePrimaryCandidate {
    pub candidate_id: String,
    pub turn_key: TurnKey,
}

/// `remove_turns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveTurns {
    pub chat_id: String,
    pub turn_ids: Vec<String>,
}

/// `set_turn_pin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTurnPin {
    pub is_pinned: bool,
    pub turn_key: TurnKey,
}
