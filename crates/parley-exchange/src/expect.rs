//! What each operation waits for, and how a frame is judged against it.
//!
//! | Operation          | Terminal                                   | Intermediate            |
//! |--------------------|--------------------------------------------|-------------------------|
//! | send message       | `add_turn`/`update_turn`, bot, final, chat | human echo, partial     |
//! | create chat        | `create_chat_response` (+ greeting turn)   | ack or greeting alone   |
//! | regenerate         | `update_turn`, same key, final             | partial                 |
//! | edit / pin         | `update_turn`, same key                    |                         |
//! | set primary        | `ok`                                       |                         |
//! | delete turns       | `remove_turns_response` / `remove_turns`   |                         |
//!
//! `neo_error` is terminal for every operation. Any other frame is skipped.

use parley_protocol::{
    tag, Chat, ChatReply, Frame, RemoveTurnsReply, Turn, TurnKey, TurnReply,
};

use crate::ExchangeError;

/// The awaited reply of one operation, plus whatever it has collected so far.
#[derive(Debug, Clone)]
pub(crate) enum Expectation {
    Reply {
        chat_id: String,
    },
    ChatCreated {
        chat_id: String,
        with_greeting: bool,
        ack: Option<Chat>,
        greeting: Option<Turn>,
    },
    Regenerated {
        key: TurnKey,
    },
    Edited {
        key: TurnKey,
    },
    Pinned {
        key: TurnKey,
    },
    PrimaryAck,
    Removed {
        chat_id: String,
    },
}

/// What a finished operation produced.
#[derive(Debug)]
pub(crate) enum Outcome {
    Turn(Turn),
    Chat(Chat, Option<Turn>),
    Ack,
}

/// The verdict on one frame.
#[derive(Debug)]
pub(crate) enum Step {
    /// The frame ends the operation.
    Done(Outcome),
    /// The frame belongs to the operation but more are needed.
    Pending,
    /// The frame is not for this operation.
    Unrelated,
}

impl Expectation {
    pub(crate) fn chat_created(chat_id: impl Into<String>, with_greeting: bool) -> Self {
        Self::ChatCreated {
            chat_id: chat_id.into(),
            with_greeting,
            ack: None,
            greeting: None,
        }
    }

    /// Judges one frame.
    ///
    /// # Errors
    /// `Server` for an error frame; `Protocol` if a frame with a relevant
    /// tag carries a payload that does not decode.
    pub(crate) fn classify(&mut self, frame: &Frame) -> Result<Step, ExchangeError> {
        if frame.is_error() {
            return Err(ExchangeError::Server {
                message: frame.error_message(),
            });
        }

        let command = frame.command.as_str();
        match self {
            Self::Reply { chat_id } => {
                if command != tag::ADD_TURN && command != tag::UPDATE_TURN {
                    return Ok(Step::Unrelated);
                }
                let turn = frame.payload_as::<TurnReply>()?.turn;
                if turn.turn_key.chat_id != *chat_id {
                    return Ok(Step::Unrelated);
                }
                if turn.author.is_human || !turn.is_final() {
                    return Ok(Step::Pending);
                }
                Ok(Step::Done(Outcome::Turn(turn)))
            }

            Self::ChatCreated {
                chat_id,
                with_greeting,
                ack,
                greeting,
            } => {
                match command {
                    tag::CREATE_CHAT_RESPONSE => {
                        let chat = frame.payload_as::<ChatReply>()?.chat;
                        if chat.chat_id != *chat_id {
                            return Ok(Step::Unrelated);
                        }
                        *ack = Some(chat);
                    }
                    tag::ADD_TURN if *with_greeting => {
                        let turn = frame.payload_as::<TurnReply>()?.turn;
                        if turn.turn_key.chat_id != *chat_id || greeting.is_some() {
                            return Ok(Step::Unrelated);
                        }
                        *greeting = Some(turn);
                    }
                    _ => return Ok(Step::Unrelated),
                }

                if ack.is_none() || (*with_greeting && greeting.is_none()) {
                    return Ok(Step::Pending);
                }
                match ack.take() {
                    Some(chat) => Ok(Step::Done(Outcome::Chat(chat, greeting.take()))),
                    None => Ok(Step::Pending),
                }
            }

            Self::Regenerated { key } => {
                let Some(turn) = updated_turn(frame, key)? else {
                    return Ok(Step::Unrelated);
                };
                if !turn.is_final() {
                    return Ok(Step::Pending);
                }
                Ok(Step::Done(Outcome::Turn(turn)))
            }

            Self::Edited { key } | Self::Pinned { key } => {
                Ok(match updated_turn(frame, key)? {
                    Some(turn) => Step::Done(Outcome::Turn(turn)),
                    None => Step::Unrelated,
                })
            }

            Self::PrimaryAck => Ok(if command == tag::OK {
                Step::Done(Outcome::Ack)
            } else {
                Step::Unrelated
            }),

            Self::Removed { chat_id } => {
                if command != tag::REMOVE_TURNS_RESPONSE && command != tag::REMOVE_TURNS {
                    return Ok(Step::Unrelated);
                }
                let reply = frame.payload_as::<Option<RemoveTurnsReply>>()?;
                match reply.and_then(|r| r.chat_id) {
                    Some(echoed) if echoed != *chat_id => Ok(Step::Unrelated),
                    _ => Ok(Step::Done(Outcome::Ack)),
                }
            }
        }
    }

    /// Whether a timed-out operation holding this expectation should swallow
    /// `frame`. Error frames and terminal frames are claimed; so are
    /// intermediate frames, which belong to the abandoned reply stream.
    ///
    /// Returns `(claimed, finished)`.
    pub(crate) fn absorb(&mut self, frame: &Frame) -> (bool, bool) {
        match self.classify(frame) {
            Ok(Step::Done(_)) | Err(_) => (true, true),
            Ok(Step::Pending) => (true, false),
            Ok(Step::Unrelated) => (false, false),
        }
    }
}

/// Decodes an `update_turn` frame addressed to `key`.
fn updated_turn(frame: &Frame, key: &TurnKey) -> Result<Option<Turn>, ExchangeError> {
    if frame.command != tag::UPDATE_TURN {
        return Ok(None);
    }
    let turn = frame.payload_as::<TurnReply>()?.turn;
    Ok((turn.turn_key == *key).then_some(turn))
}

impl Outcome {
    pub(crate) fn into_turn(self) -> Result<Turn, ExchangeError> {
        match self {
            Self::Turn(turn) => Ok(turn),
            other => Err(mismatch("turn", &other)),
        }
    }

    pub(crate) fn into_chat(self) -> Result<(Chat, Option<Turn>), ExchangeError> {
        match self {
            Self::Chat(chat, greeting) => Ok((chat, greeting)),
            other => Err(mismatch("chat", &other)),
        }
    }

    pub(crate) fn into_ack(self) -> Result<(), ExchangeError> {
        match self {
            Self::Ack => Ok(()),
            other => Err(mismatch("acknowledgement", &other)),
        }
    }
}

fn mismatch(wanted: &str, got: &Outcome) -> ExchangeError {
    ExchangeError::Protocol(parley_protocol::ProtocolError::InvalidMessage(
        format!("expected a {wanted} outcome, got {got:?}"),
    ))
}
