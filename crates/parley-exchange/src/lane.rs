//! The serial access guard and its stale-reply bookkeeping.
//!
//! Every duplex operation runs while holding the lane, so operation N+1
//! cannot send until operation N is satisfied, failed, or timed out. The
//! lane also remembers what timed-out operations were waiting for, so their
//! late replies are swallowed instead of being read as the next operation's
//! answer.

use std::collections::VecDeque;
use std::time::Duration;

use parley_protocol::Frame;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::expect::Expectation;

/// A single-lane mutex around the engine's cross-operation state.
///
/// `tokio::sync::Mutex` queues waiters in FIFO order, so concurrent callers
/// are served in the order they arrived.
#[derive(Debug, Default)]
pub(crate) struct SerialLane {
    inner: Mutex<LaneState>,
}

impl SerialLane {
    /// Waits for the lane. Dropping the guard releases it on every exit
    /// path, including caller cancellation.
    pub(crate) async fn acquire(&self) -> MutexGuard<'_, LaneState> {
        self.inner.lock().await
    }
}

/// What one timed-out operation was still waiting for.
#[derive(Debug)]
struct StaleEntry {
    request_id: String,
    expectation: Expectation,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub(crate) struct LaneState {
    seq: u64,
    generation: u64,
    stale: VecDeque<StaleEntry>,
}

impl LaneState {
    /// Starts a new operation on connection `generation` and returns its
    /// sequence number. A new generation means a new socket, which cannot
    /// carry replies to requests sent on the old one.
    pub(crate) fn begin(&mut self, generation: u64) -> u64 {
        if generation != self.generation {
            if !self.stale.is_empty() {
                tracing::debug!(
                    dropped = self.stale.len(),
                    generation,
                    "connection replaced; forgetting stale expectations"
                );
            }
            self.stale.clear();
            self.generation = generation;
        }
        self.prune(Instant::now());
        self.seq += 1;
        self.seq
    }

    /// Records a timed-out operation whose replies may still arrive.
    pub(crate) fn park(
        &mut self,
        request_id: String,
        expectation: Expectation,
        window: Duration,
    ) {
        if window.is_zero() {
            return;
        }
        self.stale.push_back(StaleEntry {
            request_id,
            expectation,
            expires_at: Instant::now() + window,
        });
    }

    /// Drops entries whose window has passed.
    pub(crate) fn prune(&mut self, now: Instant) {
        self.stale.retain(|entry| entry.expires_at > now);
    }

    #[cfg(test)]
    pub(crate) fn stale_len(&self) -> usize {
        self.stale.len()
    }

    /// Offers a frame tagged with `request_id` to the stale entry that sent
    /// it. Returns `true` if such an entry exists.
    pub(crate) fn claim_tagged(&mut self, request_id: &str, frame: &Frame) -> bool {
        let Some(pos) = self
            .stale
            .iter()
            .position(|entry| entry.request_id == request_id)
        else {
            return false;
        };
        let (_, finished) = self.stale[pos].expectation.absorb(frame);
        if finished {
            self.stale.remove(pos);
        }
        true
    }

    /// Offers an untagged frame to the stale entries, oldest first. The
    /// service answers in request order, so the oldest entry that recognises
    /// the frame owns it.
    pub(crate) fn claim_untagged(&mut self, frame: &Frame) -> bool {
        for pos in 0..self.stale.len() {
            let (claimed, finished) = self.stale[pos].expectation.absorb(frame);
            if claimed {
                if finished {
                    self.stale.remove(pos);
                }
                return true;
            }
        }
        false
    }
}
