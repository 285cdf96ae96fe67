//! Wire protocol for Parley.
//!
//! This crate defines what travels over the duplex socket:
//!
//! - **Commands** ([`Command`] and one payload struct per command) wrapped
//!   in an outgoing [`Envelope`].
//! - **Frames** ([`Frame`]) read back from the socket, with the payload left
//!   untyped until the caller knows which reply it is looking at.
//! - **Model** ([`Turn`], [`Chat`], ...) decoded from frame payloads and
//!   REST listings.
//! - **Codec** ([`Codec`], [`JsonCodec`]) converting between the two.
//!
//! It knows nothing about sockets or correlation; that lives in
//! `parley-exchange`.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope / Frame) → Exchange (operations)
//! ```

mod codec;
mod command;
mod error;
mod frame;
mod model;

pub use codec::{Codec, JsonCodec};
pub use command::{
    AuthorDraft, CandidateDraft, ChatDraft, Command, CreateAndGenerateTurn,
    CreateChat, EditTurnCandidate, GenerateTurnCandidate, PreviousAnnotations,
    RemoveTurns, SetTurnPin, TurnDraft, UpdatePrimaryCandidate,
};
pub use error::ProtocolError;
pub use frame::{
    tag, ChatReply, Envelope, Frame, RemoveTurnsReply, TurnReply,
    DEFAULT_ORIGIN,
};
pub use model::{Author, Candidate, Chat, Turn, TurnKey};
