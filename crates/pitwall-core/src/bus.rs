//! In-process fan-out of normalized events to stream subscribers.
//!
//! Built on [`tokio::sync::broadcast`]. Each subscriber has a bounded ring
//! of `capacity` messages; when a subscriber falls that far behind, its
//! oldest unread messages are overwritten and it resumes from the oldest
//! message still held (drop-oldest). Publishing is synchronous and never
//! waits on any subscriber.

use std::sync::Arc;

use pitwall_types::{Envelope, FeedState};
use tokio::sync::broadcast;
use tracing::warn;

/// An envelope together with the store revision it was applied at.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    /// Store revision after the change this envelope describes.
    pub revision: u64,
    /// The envelope as sent to subscribers.
    pub envelope: Envelope,
}

/// One message on the bus.
#[derive(Debug, Clone)]
pub enum BusMessage {
    /// A topic update, bulk value, or lap batch.
    Update(Arc<Published>),
    /// The upstream connector changed state.
    Status(FeedState),
    /// The feed has stopped; sessions should end.
    Stop,
}

/// Single-publisher, multi-subscriber broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    tx: broadcast::Sender<BusMessage>,
}

impl BroadcastBus {
    /// Create a bus holding up to `capacity` unread messages per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Start observing every message published from now on.
    pub fn subscribe(&self) -> BusReceiver {
        BusReceiver {
            rx: self.tx.subscribe(),
        }
    }

    /// Publish a message, returning how many subscribers it reached.
    ///
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, message: BusMessage) -> usize {
        self.tx.send(message).unwrap_or(0)
    }

    /// Publish an envelope applied at `revision`.
    pub fn publish_update(&self, revision: u64, envelope: Envelope) -> usize {
        self.publish(BusMessage::Update(Arc::new(Published { revision, envelope })))
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A subscriber's independent cursor into the bus.
#[derive(Debug)]
pub struct BusReceiver {
    rx: broadcast::Receiver<BusMessage>,
}

impl BusReceiver {
    /// Wait for the next message.
    ///
    /// Skips over messages lost to overflow. Returns `None` once every
    /// publisher handle has been dropped.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Bus subscriber lagged, dropping oldest messages");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(n: u64) -> Envelope {
        Envelope::new("TimingData".into(), json!({ "n": n }))
    }

    fn revision(message: Option<BusMessage>) -> Option<u64> {
        match message {
            Some(BusMessage::Update(published)) => Some(published.revision),
            _ => None,
        }
    }

    #[tokio::test]
    async fn subscribers_see_only_later_messages_in_order() {
        let bus = BroadcastBus::new(16);
        bus.publish_update(1, envelope(1));

        let mut rx = bus.subscribe();
        bus.publish_update(2, envelope(2));
        bus.publish_update(3, envelope(3));

        assert_eq!(revision(rx.recv().await), Some(2));
        assert_eq!(revision(rx.recv().await), Some(3));
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_hold_back_fast_one() {
        let bus = BroadcastBus::new(4);
        let mut fast = bus.subscribe();
        let mut slow = bus.subscribe();

        for n in 1..=10 {
            assert_eq!(bus.publish_update(n, envelope(n)), 2);
            assert_eq!(revision(fast.recv().await), Some(n));
        }

        // The slow cursor lost the oldest six and resumes at the oldest kept.
        assert_eq!(revision(slow.recv().await), Some(7));
        assert_eq!(revision(slow.recv().await), Some(8));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_harmless() {
        let bus = BroadcastBus::new(4);
        assert_eq!(bus.publish(BusMessage::Stop), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn receiver_ends_when_bus_is_dropped() {
        let bus = BroadcastBus::new(4);
        let mut rx = bus.subscribe();
        bus.publish(BusMessage::Status(FeedState::Streaming));
        drop(bus);

        assert!(matches!(rx.recv().await, Some(BusMessage::Status(FeedState::Streaming))));
        assert!(rx.recv().await.is_none());
    }
}
