//! Shared application state for the stream server.
//!
//! [`AppState`] wraps the relay [`Context`] (read-only from this side: the
//! server reads the store and subscribes to the bus, never writes or
//! publishes) plus the server settings and a live session count.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pitwall_core::Context;
use pitwall_core::config::StreamConfig;
use pitwall_types::SubscriberId;
use tracing::debug;

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    /// Store, bus, connector status and stop signal.
    pub ctx: Context,
    /// Server settings.
    pub config: StreamConfig,
    sessions: AtomicUsize,
}

impl AppState {
    /// Create the state for a server over `ctx`.
    pub const fn new(ctx: Context, config: StreamConfig) -> Self {
        Self {
            ctx,
            config,
            sessions: AtomicUsize::new(0),
        }
    }

    /// Number of open stream sessions (SSE and WebSocket).
    pub fn active_sessions(&self) -> usize {
        self.sessions.load(Ordering::Relaxed)
    }

    /// Register a new session; it is released when the guard drops.
    pub(crate) fn register_session(self: &Arc<Self>, transport: &'static str) -> SessionGuard {
        let id = SubscriberId::new();
        let open = self.sessions.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        debug!(subscriber = %id, transport, open, "Subscriber connected");
        SessionGuard {
            state: Arc::clone(self),
            id,
            transport,
        }
    }
}

/// Keeps a session counted while alive.
#[derive(Debug)]
pub(crate) struct SessionGuard {
    state: Arc<AppState>,
    id: SubscriberId,
    transport: &'static str,
}

impl SessionGuard {
    /// The subscriber's identity.
    pub(crate) const fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let open = self
            .state
            .sessions
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        debug!(subscriber = %self.id, transport = self.transport, open, "Subscriber disconnected");
    }
}
