//! # Parley
//!
//! Async client for a real-time conversational chat service.
//!
//! A [`Client`] is built from an immutable [`ClientConfig`] and the
//! [`Credentials`] of one account. Chat operations that generate or change
//! turns travel over a single duplex socket, opened lazily and shared by
//! every operation of the client; listing and housekeeping calls use plain
//! HTTP.
//!
//! ```text
//! Client
//!   ├─ RestApi ───────────── HttpTransport (reqwest)
//!   └─ TurnExchange ──────── DuplexLink ── Dialer (tokio-tungstenite)
//!        └─ Codec (JSON envelopes / frames)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn demo() -> Result<(), ParleyError> {
//! parley::telemetry::init_tracing("parley=info");
//!
//! let config = ClientConfig::builder()
//!     .reply_timeout(std::time::Duration::from_secs(30))
//!     .build();
//! let client = Client::connect(config, Credentials::new("api-token")?).await?;
//!
//! let (chat, greeting) = client.create_chat("character-id", true).await?;
//! let reply = client.send_message("character-id", &chat.chat_id, "hello").await?;
//! # let _ = (greeting, reply);
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod paging;
mod rest;
pub mod telemetry;

pub use client::{AccountLookup, Client};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::ParleyError;
pub use paging::{collect_pages, Page, PageSource};
pub use rest::{RestApi, DEFAULT_PREVIEW_TURNS};

pub use parley_exchange::{ExchangeConfig, OperationState};
pub use parley_protocol::{Author, Candidate, Chat, Turn, TurnKey};
pub use parley_session::{
    AccountProfile, AuthenticatedSession, Authenticator, Credentials,
    SessionError,
};
pub use parley_transport::{
    ConnectionState, Dialer, HttpTransport, ReqwestTransport, TransportError,
    WebSocketDialer,
};
pub use parley_protocol::ProtocolError;

/// Everything a typical caller needs.
pub mod prelude {
    pub use crate::{
        Chat, Client, ClientConfig, Credentials, ParleyError, Turn, TurnKey,
    };
}
