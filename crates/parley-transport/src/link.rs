//! The client's single duplex socket, established lazily and torn down once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    Connection, ConnectionState, Dialer, DuplexEndpoint, TransportError,
};

/// Owns at most one live [`Connection`] for a client.
///
/// All connect/close transitions run under one async mutex, so two callers
/// racing through [`ensure_connected`](Self::ensure_connected) produce
/// exactly one handshake. Sends and receives only hold that mutex long enough
/// to clone the connection handle; they never block a concurrent `close`.
///
/// A fatal I/O error or a remote close drops the socket and returns the link
/// to [`ConnectionState::Disconnected`]; the next `ensure_connected` re-dials.
pub struct DuplexLink<D: Dialer> {
    dialer: D,
    endpoint: DuplexEndpoint,
    slot: Mutex<Option<Arc<D::Connection>>>,
    state: std::sync::Mutex<ConnectionState>,
    generation: AtomicU64,
}

impl<D: Dialer> DuplexLink<D> {
    /// Creates a disconnected link. Nothing is dialed until first use.
    pub fn new(dialer: D, endpoint: DuplexEndpoint) -> Self {
        Self {
            dialer,
            endpoint,
            slot: Mutex::new(None),
            state: std::sync::Mutex::new(ConnectionState::Disconnected),
            generation: AtomicU64::new(0),
        }
    }

    /// Returns the endpoint this link dials.
    pub fn endpoint(&self) -> &DuplexEndpoint {
        &self.endpoint
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of successful handshakes so far.
    ///
    /// Changes every time a new socket replaces the previous one, which lets
    /// callers forget bookkeeping tied to frames of an older socket.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Dials the endpoint unless a socket is already live.
    ///
    /// Returns the generation of the live socket.
    pub async fn ensure_connected(&self) -> Result<u64, TransportError> {
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            return Ok(self.generation());
        }

        self.set_state(ConnectionState::Connecting);
        match self.dialer.dial(&self.endpoint).await {
            Ok(conn) => {
                let generation =
                    self.generation.fetch_add(1, Ordering::AcqRel) + 1;
                tracing::info!(
                    conn_id = %conn.id(),
                    url = %self.endpoint.url,
                    generation,
                    "duplex connection established"
                );
                *slot = Some(Arc::new(conn));
                self.set_state(ConnectionState::Connected);
                Ok(generation)
            }
            Err(e) => {
                tracing::warn!(
                    url = %self.endpoint.url,
                    error = %e,
                    "duplex handshake failed"
                );
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Writes one frame.
    pub async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let conn = self.current().await?;
        match conn.send(data).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.invalidate(&conn).await;
                Err(e)
            }
        }
    }

    /// Waits for the next data frame.
    pub async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let conn = self.current().await?;
        match conn.recv().await {
            Ok(Some(data)) => Ok(data),
            Ok(None) => {
                self.invalidate(&conn).await;
                Err(TransportError::ConnectionClosed(
                    "remote closed the connection".into(),
                ))
            }
            Err(e) => {
                self.invalidate(&conn).await;
                Err(e)
            }
        }
    }

    /// Sends a normal-closure frame (best-effort) and releases the socket.
    ///
    /// Closing a link that is not connected is a no-op.
    pub async fn close(&self) -> Result<(), TransportError> {
        let mut slot = self.slot.lock().await;
        let Some(conn) = slot.take() else {
            return Ok(());
        };

        self.set_state(ConnectionState::Closing);
        if let Err(e) = conn.close().await {
            tracing::warn!(
                conn_id = %conn.id(),
                error = %e,
                "close frame could not be delivered"
            );
        }
        self.set_state(ConnectionState::Disconnected);
        tracing::info!(conn_id = %conn.id(), "duplex connection closed");
        Ok(())
    }

    async fn current(&self) -> Result<Arc<D::Connection>, TransportError> {
        self.slot
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or(TransportError::NotConnected)
    }

    /// Drops `conn` if it is still the live socket.
    async fn invalidate(&self, conn: &Arc<D::Connection>) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|live| Arc::ptr_eq(live, conn)) {
            *slot = None;
            self.set_state(ConnectionState::Disconnected);
            tracing::info!(conn_id = %conn.id(), "duplex connection lost");
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }
}
