//! One subscriber's view of the relay: snapshot replay, then live tail.
//!
//! [`open`] subscribes to the bus *before* capturing the snapshot, so no
//! live event can slip between the two. Every bus update carries the store
//! revision it was applied at and the snapshot records its own revision;
//! updates at or below the snapshot revision are already reflected in the
//! replay and are dropped. The subscriber therefore sees each change
//! exactly once.
//!
//! The session runs on its own task and hands events to the transport
//! through a bounded channel. When the transport goes away the channel
//! closes and the task notices immediately, without waiting for a failed
//! write.

use std::sync::Arc;

use pitwall_core::{BusMessage, BusReceiver, Published, ShutdownListener, Snapshot};
use pitwall_types::{Envelope, FeedState};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

use crate::state::{AppState, SessionGuard};

/// One message destined for a subscriber.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Part of the initial snapshot replay (a topic value or a lap batch).
    Replay(Envelope),
    /// A live bus update.
    Live(Arc<Published>),
    /// The upstream connector changed state.
    Status(FeedState),
}

impl SessionEvent {
    /// The envelope carried, if this is a data event.
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Replay(envelope) => Some(envelope),
            Self::Live(published) => Some(&published.envelope),
            Self::Status(_) => None,
        }
    }

    /// Event name for transports that support named events.
    pub const fn event_name(&self) -> Option<&'static str> {
        match self {
            Self::Status(_) => Some("status"),
            Self::Replay(_) | Self::Live(_) => None,
        }
    }

    /// The event body: the envelope JSON, or `{"state": ...}` for status.
    pub fn data(&self) -> Result<String, serde_json::Error> {
        match self.envelope() {
            Some(envelope) => envelope.to_json_string(),
            None => Ok(self.status_body().to_string()),
        }
    }

    /// A self-describing frame for transports without named events.
    ///
    /// Status events are wrapped as `{"type": "status", "payload": {...}}`.
    pub fn frame(&self) -> Result<String, serde_json::Error> {
        match self.envelope() {
            Some(envelope) => envelope.to_json_string(),
            None => Ok(json!({ "type": "status", "payload": self.status_body() }).to_string()),
        }
    }

    fn status_body(&self) -> serde_json::Value {
        match self {
            Self::Status(state) => json!({ "state": state.as_str() }),
            Self::Replay(_) | Self::Live(_) => serde_json::Value::Null,
        }
    }
}

/// The replay sequence for a snapshot: one envelope per topic, then the lap
/// log in batches of `lap_batch` events.
pub fn replay(snapshot: &Snapshot, lap_batch: usize) -> Vec<SessionEvent> {
    let topics = snapshot.topics.iter().cloned().map(SessionEvent::Replay);
    let laps = snapshot
        .laps
        .chunks(lap_batch.max(1))
        .map(|batch| SessionEvent::Replay(Envelope::laps(batch)));
    topics.chain(laps).collect()
}

/// Open a session and return the receiving end of its event channel.
///
/// The channel closes when the session ends: on the bus stop sentinel, on
/// global shutdown, or once the receiver is dropped.
pub fn open(state: &Arc<AppState>, transport: &'static str) -> mpsc::Receiver<SessionEvent> {
    let guard = state.register_session(transport);
    let bus = state.ctx.bus.subscribe();
    let snapshot = state.ctx.store.snapshot();
    let stop = state.ctx.shutdown.listener();
    let (tx, rx) = mpsc::channel(state.config.subscriber_buffer.max(1));

    debug!(
        subscriber = %guard.id(),
        revision = snapshot.revision,
        topics = snapshot.topics.len(),
        laps = snapshot.laps.len(),
        "Session snapshot captured"
    );

    let lap_batch = state.config.lap_batch_size;
    tokio::spawn(run(guard, snapshot, lap_batch, bus, stop, tx));
    rx
}

async fn run(
    guard: SessionGuard,
    snapshot: Snapshot,
    lap_batch: usize,
    mut bus: BusReceiver,
    mut stop: ShutdownListener,
    tx: mpsc::Sender<SessionEvent>,
) {
    for event in replay(&snapshot, lap_batch) {
        if !deliver(&tx, event, &mut stop).await {
            return;
        }
    }

    loop {
        let message = tokio::select! {
            () = tx.closed() => return,
            _ = stop.wait() => return,
            message = bus.recv() => message,
        };

        let event = match message {
            Some(BusMessage::Update(published)) if published.revision <= snapshot.revision => continue,
            Some(BusMessage::Update(published)) => SessionEvent::Live(published),
            Some(BusMessage::Status(state)) => SessionEvent::Status(state),
            Some(BusMessage::Stop) | None => {
                debug!(subscriber = %guard.id(), "Stream stopped by feed");
                return;
            }
        };
        if !deliver(&tx, event, &mut stop).await {
            return;
        }
    }
}

/// Hand one event to the transport. Returns `false` if the session is over.
async fn deliver(tx: &mpsc::Sender<SessionEvent>, event: SessionEvent, stop: &mut ShutdownListener) -> bool {
    tokio::select! {
        sent = tx.send(event) => sent.is_ok(),
        _ = stop.wait() => false,
    }
}
