//! Latest-value-per-topic state plus the append-only lap log.
//!
//! [`StateStore`] is the contract the ingest pipeline writes through and
//! the stream server reads through. Any durable store meeting it is
//! interchangeable with [`InMemoryStore`], which is what the relay runs
//! with: state is session-scoped and cleared on restart.
//!
//! Every mutation bumps a monotonically increasing revision. Writers
//! publish the revision alongside the change, and [`Snapshot`] records the
//! revision it was captured at, so a reader can tell which live changes a
//! snapshot already contains.

use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::RwLock;
use pitwall_types::{Envelope, LapEvent, LapRecord, Topic};
use serde_json::Value;

use crate::merge::deep_merge;

/// Default page size for lap queries.
pub const DEFAULT_LAP_LIMIT: usize = 100;

/// Largest page a lap query may request.
pub const MAX_LAP_LIMIT: usize = 1000;

/// A consistent point-in-time view of the whole store.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Revision of the last mutation included in this view.
    pub revision: u64,
    /// One envelope per known topic, ordered by topic name.
    pub topics: Vec<Envelope>,
    /// The full lap log in insertion order.
    pub laps: Vec<LapEvent>,
}

/// Paging and filtering for lap log reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LapQuery {
    /// Number of matching laps to skip.
    pub offset: usize,
    /// Maximum number of laps to return (clamped to [`MAX_LAP_LIMIT`]).
    pub limit: usize,
    /// Only return laps for this racing number.
    pub racing_number: Option<String>,
}

impl LapQuery {
    /// An unfiltered page.
    pub const fn page(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit,
            racing_number: None,
        }
    }

    /// Restrict the query to one racing number.
    #[must_use]
    pub fn for_driver(mut self, racing_number: impl Into<String>) -> Self {
        self.racing_number = Some(racing_number.into());
        self
    }

    fn matches(&self, record: &LapRecord) -> bool {
        self.racing_number
            .as_deref()
            .is_none_or(|number| record.event.racing_number == number)
    }
}

impl Default for LapQuery {
    fn default() -> Self {
        Self::page(0, DEFAULT_LAP_LIMIT)
    }
}

/// Snapshot-plus-history store for topic state and derived laps.
///
/// All methods are synchronous and bounded. A single reader never observes
/// a partially applied merge.
pub trait StateStore: Send + Sync {
    /// Deep-merge `payload` into the stored value for `topic`, creating it
    /// if absent. Returns the new revision.
    fn merge(&self, topic: &Topic, payload: Value) -> u64;

    /// Replace the stored value for `topic`. Returns the new revision.
    fn set(&self, topic: &Topic, payload: Value) -> u64;

    /// The stored value for `topic`, if any.
    fn get(&self, topic: &str) -> Option<Value>;

    /// Every topic and the lap log, captured under one read barrier.
    fn snapshot(&self) -> Snapshot;

    /// Append lap events in order. Returns the new revision, or the current
    /// one if `events` is empty.
    fn append_laps(&self, events: &[LapEvent]) -> u64;

    /// Read a page of the lap log in insertion order.
    fn list_laps(&self, query: &LapQuery) -> Vec<LapRecord>;

    /// Names of all known topics, ordered.
    fn topics(&self) -> Vec<Topic>;

    /// Revision of the most recent mutation (0 when empty).
    fn revision(&self) -> u64;

    /// Number of laps in the log.
    fn lap_count(&self) -> usize;

    /// Append a single lap event.
    fn append_lap(&self, event: LapEvent) -> u64 {
        self.append_laps(std::slice::from_ref(&event))
    }
}

#[derive(Debug, Default)]
struct Inner {
    topics: BTreeMap<Topic, Value>,
    laps: Vec<LapRecord>,
    revision: u64,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        self.revision = self.revision.saturating_add(1);
        self.revision
    }
}

/// In-process [`StateStore`] behind a single reader-writer lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStore {
    fn merge(&self, topic: &Topic, payload: Value) -> u64 {
        let mut inner = self.inner.write();
        match inner.topics.get_mut(topic.as_str()) {
            Some(existing) => deep_merge(existing, payload),
            None => {
                inner.topics.insert(topic.clone(), payload);
            }
        }
        inner.bump()
    }

    fn set(&self, topic: &Topic, payload: Value) -> u64 {
        let mut inner = self.inner.write();
        inner.topics.insert(topic.clone(), payload);
        inner.bump()
    }

    fn get(&self, topic: &str) -> Option<Value> {
        self.inner.read().topics.get(topic).cloned()
    }

    fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read();
        Snapshot {
            revision: inner.revision,
            topics: inner
                .topics
                .iter()
                .map(|(topic, payload)| Envelope::new(topic.clone(), payload.clone()))
                .collect(),
            laps: inner.laps.iter().map(|record| record.event.clone()).collect(),
        }
    }

    fn append_laps(&self, events: &[LapEvent]) -> u64 {
        let mut inner = self.inner.write();
        if events.is_empty() {
            return inner.revision;
        }
        let received_at = Utc::now();
        for event in events {
            let index = u64::try_from(inner.laps.len()).unwrap_or(u64::MAX);
            inner.laps.push(LapRecord {
                index,
                event: event.clone(),
                received_at,
            });
        }
        inner.bump()
    }

    fn list_laps(&self, query: &LapQuery) -> Vec<LapRecord> {
        let limit = query.limit.min(MAX_LAP_LIMIT);
        self.inner
            .read()
            .laps
            .iter()
            .filter(|record| query.matches(record))
            .skip(query.offset)
            .take(limit)
            .cloned()
            .collect()
    }

    fn topics(&self) -> Vec<Topic> {
        self.inner.read().topics.keys().cloned().collect()
    }

    fn revision(&self) -> u64 {
        self.inner.read().revision
    }

    fn lap_count(&self) -> usize {
        self.inner.read().laps.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn topic(name: &str) -> Topic {
        Topic::from(name)
    }

    #[test]
    fn merge_creates_then_deep_merges() {
        let store = InMemoryStore::new();
        store.merge(&topic("TimingData"), json!({"a": 1, "b": {"c": 1}}));
        store.merge(&topic("TimingData"), json!({"b": {"d": 2}}));
        assert_eq!(
            store.get("TimingData"),
            Some(json!({"a": 1, "b": {"c": 1, "d": 2}}))
        );
    }

    #[test]
    fn set_replaces_unconditionally() {
        let store = InMemoryStore::new();
        store.merge(&topic("DriverList"), json!({"44": {"Tla": "HAM"}}));
        store.set(&topic("DriverList"), json!({"1": {"Tla": "VER"}}));
        assert_eq!(store.get("DriverList"), Some(json!({"1": {"Tla": "VER"}})));
    }

    #[test]
    fn every_mutation_bumps_revision() {
        let store = InMemoryStore::new();
        assert_eq!(store.revision(), 0);
        assert_eq!(store.set(&topic("A"), json!({})), 1);
        assert_eq!(store.merge(&topic("A"), json!({"x": 1})), 2);
        assert_eq!(store.append_laps(&[LapEvent::new("44", 1, "1:30.0")]), 3);
        assert_eq!(store.append_laps(&[]), 3);
        assert_eq!(store.snapshot().revision, 3);
    }

    #[test]
    fn snapshot_has_one_envelope_per_topic() {
        let store = InMemoryStore::new();
        store.merge(&topic("TimingData"), json!({"Lines": {}}));
        store.merge(&topic("TimingData"), json!({"Lines": {"44": {}}}));
        store.set(&topic("SessionInfo"), json!({"Name": "Race"}));
        store.append_lap(LapEvent::new("44", 1, "1:31.000"));

        let snap = store.snapshot();
        let names: Vec<&str> = snap.topics.iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(names, vec!["SessionInfo", "TimingData"]);
        assert_eq!(snap.laps, vec![LapEvent::new("44", 1, "1:31.000")]);
    }

    #[test]
    fn lap_log_preserves_insertion_order_and_pages() {
        let store = InMemoryStore::new();
        for lap in 1..=5 {
            store.append_lap(LapEvent::new("44", lap, format!("1:3{lap}.000")));
            store.append_lap(LapEvent::new("1", lap, format!("1:2{lap}.000")));
        }

        let page = store.list_laps(&LapQuery::page(2, 3));
        let indices: Vec<u64> = page.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![2, 3, 4]);

        let hamilton = store.list_laps(&LapQuery::page(1, 10).for_driver("44"));
        let laps: Vec<u32> = hamilton.iter().map(|r| r.event.lap_number).collect();
        assert_eq!(laps, vec![2, 3, 4, 5]);
        assert_eq!(store.lap_count(), 10);
    }

    #[test]
    fn lap_limit_is_clamped() {
        let store = InMemoryStore::new();
        let events: Vec<LapEvent> = (0..1200).map(|n| LapEvent::new("44", n, "1:30.000")).collect();
        store.append_laps(&events);
        assert_eq!(store.list_laps(&LapQuery::page(0, 5000)).len(), MAX_LAP_LIMIT);
    }

    #[test]
    fn readers_never_observe_partial_merges() {
        let store = Arc::new(InMemoryStore::new());
        store.set(&topic("T"), json!({"a": 0, "b": {"v": 0}}));

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 1..=2000_u32 {
                    store.merge(&topic("T"), json!({"a": i, "b": {"v": i}}));
                }
            })
        };

        for _ in 0..2000 {
            let value = store.get("T").unwrap();
            assert_eq!(value["a"], value["b"]["v"]);
        }
        writer.join().unwrap();
    }
}
