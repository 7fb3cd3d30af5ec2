//! Topics and the `{type, payload}` envelope.
//!
//! An [`Envelope`] is the unit the state store keeps per topic and the
//! unit every downstream subscriber receives. Its JSON form is
//! `{"type": "<topic>", "payload": <value>}`.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::lap::LapEvent;

/// Name of the derived topic carrying batches of [`LapEvent`]s.
pub const LAP_DATA_TOPIC: &str = "LapData";

/// A named channel of timing or session data (e.g. `DriverList`).
///
/// Topics are opaque strings chosen by the upstream feed. The store keeps
/// one latest value per topic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct Topic(String);

impl Topic {
    /// Create a topic from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The derived `LapData` topic.
    pub fn lap_data() -> Self {
        Self::new(LAP_DATA_TOPIC)
    }

    /// Borrow the topic name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Topic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Topic {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// The `{type, payload}` unit exchanged internally and with subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Envelope {
    /// The topic this payload belongs to.
    #[serde(rename = "type")]
    pub topic: Topic,
    /// The topic payload: a full value for snapshots, a delta for live updates.
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Wrap a payload for a topic.
    pub const fn new(topic: Topic, payload: serde_json::Value) -> Self {
        Self { topic, payload }
    }

    /// Build a `LapData` envelope whose payload is an array of lap events.
    pub fn laps(events: &[LapEvent]) -> Self {
        let payload = serde_json::Value::Array(events.iter().map(LapEvent::to_json).collect());
        Self::new(Topic::lap_data(), payload)
    }

    /// Encode the envelope as a single JSON line.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if encoding fails.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn envelope_uses_type_key() {
        let env = Envelope::new(Topic::from("SessionInfo"), serde_json::json!({"Name": "Race"}));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "SessionInfo");
        assert_eq!(json["payload"]["Name"], "Race");
    }

    #[test]
    fn lap_envelope_wraps_event_batch() {
        let events = vec![
            LapEvent::new("44", 5, "1:23.456"),
            LapEvent::new("1", 5, "1:22.001"),
        ];
        let env = Envelope::laps(&events);
        assert_eq!(env.topic.as_str(), LAP_DATA_TOPIC);
        assert_eq!(env.payload[0]["RacingNumber"], "44");
        assert_eq!(env.payload[1]["LapTime"], "1:22.001");
    }

    #[test]
    fn topic_borrows_as_str_for_map_lookups() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(Topic::from("TimingData"), 1);
        assert_eq!(map.get("TimingData"), Some(&1));
    }
}
