//! The turn-exchange engine.
//!
//! Each public operation sends one envelope and then reads frames until the
//! operation's terminal frame (or an error frame) arrives:
//!
//! ```text
//! acquire lane → ensure_connected → encode + send → loop { recv → route → classify }
//! ```
//!
//! Routing happens before classification: a frame echoing another request
//! id is never attributed to the in-flight operation, and an untagged frame
//! is first offered to operations that already timed out.

use parley_protocol::{
    AuthorDraft, ChatDraft, Chat, Codec, Command, CreateAndGenerateTurn,
    CreateChat, EditTurnCandidate, Envelope, GenerateTurnCandidate, JsonCodec,
    RemoveTurns, SetTurnPin, Turn, TurnKey, UpdatePrimaryCandidate,
};
use parley_session::AuthenticatedSession;
use parley_transport::{ConnectionState, Dialer, DuplexEndpoint, DuplexLink};
use tokio::time::Instant;
use uuid::Uuid;

use crate::expect::{Expectation, Outcome, Step};
use crate::lane::{LaneState, SerialLane};
use crate::{ExchangeConfig, ExchangeError, OperationState};

/// Drives all duplex operations of one client over one lazily-opened socket.
///
/// Safe to share between tasks (`Arc<TurnExchange<_>>`); operations queue on
/// an internal lane and run one at a time.
pub struct TurnExchange<D: Dialer, C: Codec = JsonCodec> {
    link: DuplexLink<D>,
    codec: C,
    session: AuthenticatedSession,
    config: ExchangeConfig,
    lane: SerialLane,
}

impl<D: Dialer> TurnExchange<D> {
    /// Creates an engine speaking JSON. Nothing is dialed until the first
    /// operation.
    pub fn new(
        dialer: D,
        endpoint: DuplexEndpoint,
        session: AuthenticatedSession,
        config: ExchangeConfig,
    ) -> Self {
        Self::with_codec(dialer, endpoint, session, config, JsonCodec)
    }
}

impl<D: Dialer, C: Codec> TurnExchange<D, C> {
    pub fn with_codec(
        dialer: D,
        endpoint: DuplexEndpoint,
        session: AuthenticatedSession,
        config: ExchangeConfig,
        codec: C,
    ) -> Self {
        Self {
            link: DuplexLink::new(dialer, endpoint),
            codec,
            session,
            config,
            lane: SerialLane::default(),
        }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.link.state()
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Posts `text` as the caller's turn in `chat_id` and returns the
    /// character's finished reply.
    pub async fn send_message(
        &self,
        character_id: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<Turn, ExchangeError> {
        require("character id", character_id)?;
        require("chat id", chat_id)?;
        require("message text", text)?;

        let profile = self.session.profile();
        let author = AuthorDraft {
            author_id: profile.account_id.clone(),
            is_human: true,
            name: profile.display_name.clone(),
        };
        let payload = CreateAndGenerateTurn::user_message(
            character_id,
            TurnKey::new(chat_id, new_id()),
            author,
            new_id(),
            text,
        );

        self.run(
            Command::CreateAndGenerateTurn(payload),
            Expectation::Reply {
                chat_id: chat_id.to_owned(),
            },
        )
        .await?
        .into_turn()
    }

    /// Creates a private chat with `character_id`. With `with_greeting`,
    /// also waits for and returns the character's greeting turn.
    pub async fn create_chat(
        &self,
        character_id: &str,
        with_greeting: bool,
    ) -> Result<(Chat, Option<Turn>), ExchangeError> {
        require("character id", character_id)?;

        let chat_id = new_id();
        let payload = CreateChat {
            chat: ChatDraft::one_on_one(
                chat_id.clone(),
                self.session.account_id(),
                character_id,
            ),
            with_greeting,
        };

        self.run(
            Command::CreateChat(payload),
            Expectation::chat_created(chat_id, with_greeting),
        )
        .await?
        .into_chat()
    }

    /// Asks the character for another candidate on an existing turn and
    /// returns the turn once the new candidate is final.
    pub async fn regenerate(
        &self,
        character_id: &str,
        key: &TurnKey,
    ) -> Result<Turn, ExchangeError> {
        require("character id", character_id)?;
        require_key(key)?;

        let payload = GenerateTurnCandidate::new(
            character_id,
            key.clone(),
            self.session.profile().display_name.clone(),
        );

        self.run(
            Command::GenerateTurnCandidate(payload),
            Expectation::Regenerated { key: key.clone() },
        )
        .await?
        .into_turn()
    }

    /// Replaces the text of a candidate.
    pub async fn edit_turn(
        &self,
        key: &TurnKey,
        candidate_id: &str,
        text: &str,
    ) -> Result<Turn, ExchangeError> {
        require_key(key)?;
        require("candidate id", candidate_id)?;
        require("message text", text)?;

        let payload = EditTurnCandidate {
            turn_key: key.clone(),
            current_candidate_id: candidate_id.to_owned(),
            new_candidate_raw_content: text.to_owned(),
        };

        self.run(
            Command::EditTurnCandidate(payload),
            Expectation::Edited { key: key.clone() },
        )
        .await?
        .into_turn()
    }

    /// Makes `candidate_id` the turn's primary candidate.
    pub async fn set_primary_candidate(
        &self,
        key: &TurnKey,
        candidate_id: &str,
    ) -> Result<(), ExchangeError> {
        require_key(key)?;
        require("candidate id", candidate_id)?;

        let payload = UpdatePrimaryCandidate {
            candidate_id: candidate_id.to_owned(),
            turn_key: key.clone(),
        };

        self.run(Command::UpdatePrimaryCandidate(payload), Expectation::PrimaryAck)
            .await?
            .into_ack()
    }

    /// Removes turns from a chat.
    pub async fn delete_turns(
        &self,
        chat_id: &str,
        turn_ids: &[String],
    ) -> Result<(), ExchangeError> {
        require("chat id", chat_id)?;
        if turn_ids.is_empty() {
            return Err(ExchangeError::Validation(
                "at least one turn id is required".into(),
            ));
        }
        for turn_id in turn_ids {
            require("turn id", turn_id)?;
        }

        let payload = RemoveTurns {
            chat_id: chat_id.to_owned(),
            turn_ids: turn_ids.to_vec(),
        };

        self.run(
            Command::RemoveTurns(payload),
            Expectation::Removed {
                chat_id: chat_id.to_owned(),
            },
        )
        .await?
        .into_ack()
    }

    /// Pins or unpins a turn.
    ///
    /// # Errors
    /// `NotApplied` if the service answers with a turn whose pin flag is not
    /// the requested one.
    pub async fn set_pinned(
        &self,
        key: &TurnKey,
        pinned: bool,
    ) -> Result<Turn, ExchangeError> {
        require_key(key)?;

        let payload = SetTurnPin {
            is_pinned: pinned,
            turn_key: key.clone(),
        };

        let turn = self
            .run(
                Command::SetTurnPin(payload),
                Expectation::Pinned { key: key.clone() },
            )
            .await?
            .into_turn()?;

        if turn.is_pinned != pinned {
            return Err(ExchangeError::NotApplied(format!(
                "turn {key} is still {}",
                if turn.is_pinned { "pinned" } else { "unpinned" }
            )));
        }
        Ok(turn)
    }

    /// Closes the socket. Idempotent; a later operation dials again.
    pub async fn close(&self) -> Result<(), ExchangeError> {
        self.link.close().await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Core loop
    // -----------------------------------------------------------------------

    async fn run(
        &self,
        command: Command,
        mut expectation: Expectation,
    ) -> Result<Outcome, ExchangeError> {
        let mut lane = self.lane.acquire().await;
        let mut state = OperationState::Idle;

        let generation = match self.link.ensure_connected().await {
            Ok(generation) => generation,
            Err(e) => {
                transition(&mut state, OperationState::Failed);
                return Err(e.into());
            }
        };
        let op = lane.begin(generation);

        let request_id = new_id();
        let envelope = Envelope::new(command, request_id.clone())
            .with_origin(self.config.origin.clone());
        let name = envelope.command.name();

        let sent = async {
            let bytes = self.codec.encode_envelope(&envelope)?;
            self.link.send(&bytes).await?;
            Ok::<_, ExchangeError>(())
        }
        .await;
        if let Err(e) = sent {
            transition(&mut state, OperationState::Failed);
            tracing::debug!(op, command = name, error = %e, "envelope not sent");
            return Err(e);
        }
        transition(&mut state, OperationState::AwaitingAck);
        tracing::debug!(op, %request_id, command = name, "envelope sent");

        let timeout = self.config.reply_timeout;
        let waited = tokio::time::timeout(
            timeout,
            self.await_reply(&mut lane, &request_id, &mut expectation),
        )
        .await;

        let result = match waited {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    op,
                    %request_id,
                    command = name,
                    ?timeout,
                    "no reply in time; late frames will be discarded"
                );
                lane.park(request_id, expectation, self.config.stale_window);
                Err(ExchangeError::Timeout { after: timeout })
            }
        };

        match &result {
            Ok(_) => {
                transition(&mut state, OperationState::Satisfied);
                tracing::debug!(op, command = name, "operation satisfied");
            }
            Err(e) => {
                transition(&mut state, OperationState::Failed);
                tracing::debug!(op, command = name, error = %e, "operation failed");
            }
        }
        result
    }

    async fn await_reply(
        &self,
        lane: &mut LaneState,
        request_id: &str,
        expectation: &mut Expectation,
    ) -> Result<Outcome, ExchangeError> {
        loop {
            let bytes = self.link.recv().await?;
            let frame = self.codec.decode_frame(&bytes)?;
            lane.prune(Instant::now());

            match frame.correlation_id() {
                Some(id) if id == request_id => {}
                Some(id) => {
                    if lane.claim_tagged(id, &frame) {
                        tracing::warn!(
                            request_id = id,
                            command = %frame.command,
                            "late reply to a timed-out request discarded"
                        );
                    } else {
                        tracing::trace!(
                            request_id = id,
                            command = %frame.command,
                            "frame for another request skipped"
                        );
                    }
                    continue;
                }
                None => {
                    if lane.claim_untagged(&frame) {
                        tracing::warn!(
                            command = %frame.command,
                            "late frame claimed by a timed-out operation"
                        );
                        continue;
                    }
                }
            }

            match expectation.classify(&frame)? {
                Step::Done(outcome) => return Ok(outcome),
                Step::Pending => {
                    tracing::trace!(command = %frame.command, "intermediate frame")
                }
                Step::Unrelated => {
                    tracing::trace!(command = %frame.command, "unrelated frame skipped")
                }
            }
        }
    }
}

fn transition(state: &mut OperationState, next: OperationState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal operation transition {state} -> {next}"
    );
    *state = next;
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn require(what: &str, value: &str) -> Result<(), ExchangeError> {
    if value.trim().is_empty() {
        return Err(ExchangeError::Validation(format!("{what} must not be empty")));
    }
    Ok(())
}

fn require_key(key: &TurnKey) -> Result<(), ExchangeError> {
    require("chat id", &key.chat_id)?;
    require("turn id", &key.turn_id)
}
