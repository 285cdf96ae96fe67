//! Exchange configuration and the per-operation state machine.

use std::time::Duration;

use parley_protocol::DEFAULT_ORIGIN;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ExchangeConfig
// ---------------------------------------------------------------------------

/// Tuning for the turn-exchange engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// How long one operation waits for its terminal frame.
    pub reply_timeout: Duration,

    /// How long a timed-out operation's late replies are still recognised
    /// and discarded.
    ///
    /// Untagged replies are matched by chat or turn, not by request. A
    /// retry in the same chat inside this window can therefore have its
    /// reply swallowed by the timed-out entry and time out in turn. Callers
    /// that retry immediately should wait out the window or keep it short.
    pub stale_window: Duration,

    /// `origin_id` stamped on every envelope.
    pub origin: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(60),
            stale_window: Duration::from_secs(30),
            origin: DEFAULT_ORIGIN.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// OperationState
// ---------------------------------------------------------------------------

/// Lifecycle of one in-flight duplex operation.
///
/// ```text
/// Idle → AwaitingAck → Satisfied
///             │
///             └──────→ Failed
/// ```
///
/// Nothing carries over between operations except the shared connection and
/// the stale-reply bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Idle,
    AwaitingAck,
    Satisfied,
    Failed,
}

impl OperationState {
    /// `true` once the operation has an outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Satisfied | Self::Failed)
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Idle, Self::AwaitingAck)
                | (Self::Idle, Self::Failed)
                | (Self::AwaitingAck, Self::Satisfied)
                | (Self::AwaitingAck, Self::Failed)
        )
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::AwaitingAck => write!(f, "AwaitingAck"),
            Self::Satisfied => write!(f, "Satisfied"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}
