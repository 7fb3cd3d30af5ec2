//! Lap completion events derived from `TimingData` updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One completed, timed lap by one car.
///
/// `lap_number` is the lap just completed. Field names match the
/// upstream feed's `PascalCase` convention on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "PascalCase")]
#[ts(export, export_to = "bindings/")]
pub struct LapEvent {
    /// The car's racing number, as keyed in the `Lines` mapping.
    pub racing_number: String,
    /// The lap that was just completed.
    pub lap_number: u32,
    /// The recorded lap time, verbatim (e.g. `1:23.456`).
    pub lap_time: String,
}

impl LapEvent {
    /// Create a lap event.
    pub fn new(racing_number: impl Into<String>, lap_number: u32, lap_time: impl Into<String>) -> Self {
        Self {
            racing_number: racing_number.into(),
            lap_number,
            lap_time: lap_time.into(),
        }
    }

    /// JSON form of the event.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "RacingNumber": self.racing_number,
            "LapNumber": self.lap_number,
            "LapTime": self.lap_time,
        })
    }
}

/// A lap event as held in the append-only lap log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LapRecord {
    /// Position in the lap log (0-based, insertion order).
    pub index: u64,
    /// The derived event.
    #[serde(flatten)]
    pub event: LapEvent,
    /// When the backend appended the event.
    pub received_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_pascal_case() {
        let lap = LapEvent::new("44", 5, "1:23.456");
        let json = serde_json::to_value(&lap).unwrap();
        assert_eq!(json, lap.to_json());
        assert_eq!(json["LapNumber"], 5);
    }

    #[test]
    fn record_flattens_event_fields() {
        let record = LapRecord {
            index: 3,
            event: LapEvent::new("16", 12, "1:31.002"),
            received_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["index"], 3);
        assert_eq!(json["RacingNumber"], "16");
        assert!(json.get("received_at").is_some());
    }
}
