//! Lap completion extraction from `TimingData` payloads.
//!
//! A `TimingData` update carries a `Lines` mapping from racing number to a
//! per-driver delta. A delta that holds both `NumberOfLaps` and a
//! `LastLapTime` mapping with a non-empty `Value` marks a completed lap.
//! `NumberOfLaps` is the lap just completed, not the one in progress.
//!
//! Anything that does not fit this shape is skipped without error.

use pitwall_types::LapEvent;
use serde_json::Value;

/// Extract every lap completion event from one `TimingData` payload.
///
/// Events come out in the payload's key order. A missing or non-mapping
/// `Lines` field yields no events.
pub fn extract_laps(payload: &Value) -> Vec<LapEvent> {
    let Some(lines) = payload.get("Lines").and_then(Value::as_object) else {
        return Vec::new();
    };

    lines
        .iter()
        .filter_map(|(racing_number, update)| lap_from_update(racing_number, update))
        .collect()
}

fn lap_from_update(racing_number: &str, update: &Value) -> Option<LapEvent> {
    let update = update.as_object()?;
    let lap_number = update.get("NumberOfLaps").and_then(lap_number)?;
    let lap_time = update
        .get("LastLapTime")?
        .as_object()?
        .get("Value")?
        .as_str()
        .filter(|value| !value.is_empty())?;

    Some(LapEvent::new(racing_number, lap_number, lap_time))
}

/// Accept integer lap counts, including ones the feed sends as strings.
fn lap_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}
