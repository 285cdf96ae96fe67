//! Turn-exchange engine for Parley.
//!
//! One duplex socket carries every real-time chat operation of a client.
//! Replies come back as a stream of frames that are not reliably tagged with
//! the request they answer, so this crate serialises operations and matches
//! each frame against what the in-flight operation is waiting for.
//!
//! # Key types
//!
//! - [`TurnExchange`]: the seven duplex operations (send message, create
//!   chat, regenerate, edit, set primary, delete, pin)
//! - [`ExchangeConfig`]: reply timeout, stale-reply window, origin tag
//! - [`OperationState`]: lifecycle of one in-flight operation
//! - [`ExchangeError`]: the caller-visible failure taxonomy

mod config;
mod engine;
mod error;
mod expect;
mod lane;

pub use config::{ExchangeConfig, OperationState};
pub use engine::TurnExchange;
pub use error::ExchangeError;
