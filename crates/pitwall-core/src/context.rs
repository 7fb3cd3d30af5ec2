//! The owned context shared by every component of the relay.
//!
//! The ingest pipeline is the only writer of the store and the only
//! publisher on the bus; the stream server only reads the store and
//! subscribes to the bus. Components receive a clone of [`Context`] at
//! construction instead of reaching for globals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pitwall_types::FeedState;

use crate::bus::BroadcastBus;
use crate::shutdown::Shutdown;
use crate::store::{InMemoryStore, StateStore};

/// Last known connector state, as recorded by the pipeline.
#[derive(Debug)]
pub struct FeedStatus {
    inner: RwLock<StatusInner>,
}

#[derive(Debug, Clone, Copy)]
struct StatusInner {
    state: FeedState,
    since: DateTime<Utc>,
    last_source_time: Option<DateTime<Utc>>,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self {
            inner: RwLock::new(StatusInner {
                state: FeedState::Disconnected,
                since: Utc::now(),
                last_source_time: None,
            }),
        }
    }
}

impl FeedStatus {
    /// Record a state change. Returns `false` if the state is unchanged.
    pub fn set(&self, state: FeedState) -> bool {
        let mut inner = self.inner.write();
        if inner.state == state {
            return false;
        }
        inner.state = state;
        inner.since = Utc::now();
        true
    }

    /// The current state.
    pub fn state(&self) -> FeedState {
        self.inner.read().state
    }

    /// When the current state was entered.
    pub fn since(&self) -> DateTime<Utc> {
        self.inner.read().since
    }

    /// Remember the newest upstream timestamp seen so far.
    pub fn record_source_time(&self, at: DateTime<Utc>) {
        let mut inner = self.inner.write();
        if inner.last_source_time.is_none_or(|last| at > last) {
            inner.last_source_time = Some(at);
        }
    }

    /// Newest upstream timestamp seen, if any.
    pub fn last_source_time(&self) -> Option<DateTime<Utc>> {
        self.inner.read().last_source_time
    }
}

/// Handles to the store, bus, connector status and stop signal.
#[derive(Clone)]
pub struct Context {
    /// Topic state and lap log.
    pub store: Arc<dyn StateStore>,
    /// Fan-out channel to stream sessions.
    pub bus: BroadcastBus,
    /// Connector state as last seen by the pipeline.
    pub status: Arc<FeedStatus>,
    /// Process-wide stop signal.
    pub shutdown: Shutdown,
}

impl Context {
    /// A context backed by a fresh [`InMemoryStore`].
    pub fn in_memory(bus_capacity: usize) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), bus_capacity)
    }

    /// A context around an existing store.
    pub fn with_store(store: Arc<dyn StateStore>, bus_capacity: usize) -> Self {
        Self {
            store,
            bus: BroadcastBus::new(bus_capacity),
            status: Arc::new(FeedStatus::default()),
            shutdown: Shutdown::new(),
        }
    }
}

impl core::fmt::Debug for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Context")
            .field("revision", &self.store.revision())
            .field("subscribers", &self.bus.subscriber_count())
            .field("status", &self.status.state())
            .field("stopped", &self.shutdown.is_triggered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_records_only_changes() {
        let status = FeedStatus::default();
        assert_eq!(status.state(), FeedState::Disconnected);
        assert!(status.set(FeedState::Connecting));
        assert!(!status.set(FeedState::Connecting));
        assert_eq!(status.state(), FeedState::Connecting);
    }

    #[test]
    fn source_time_only_moves_forward() {
        let status = FeedStatus::default();
        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(5);
        status.record_source_time(later);
        status.record_source_time(earlier);
        assert_eq!(status.last_source_time(), Some(later));
    }

    #[test]
    fn clones_share_the_same_store() {
        let ctx = Context::in_memory(8);
        let other = ctx.clone();
        other.store.set(&"SessionInfo".into(), serde_json::json!({"Name": "Race"}));
        assert_eq!(ctx.store.revision(), 1);
    }
}
