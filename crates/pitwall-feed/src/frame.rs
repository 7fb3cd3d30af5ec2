//! Classification of decoded upstream frames.
//!
//! A frame is a JSON object that may carry a bulk snapshot under `R`
//! (`{topic: payload, ...}`) and incremental updates under `M`
//! (`[{"A": [topic, payload, timestamp]}, ...]`). Anything else, such as
//! the `{}` heartbeat or a subscribe acknowledgement, carries no data.

use chrono::{DateTime, NaiveDateTime, Utc};
use pitwall_core::{CoreError, dialect};
use pitwall_types::Topic;
use serde_json::{Map, Value};

/// The upstream timestamp attached to an incremental update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTimestamp {
    /// Parsed as ISO-8601; naive values are taken as UTC.
    Parsed(DateTime<Utc>),
    /// A string that did not parse, kept verbatim.
    Raw(String),
}

impl SourceTimestamp {
    /// Parse an upstream timestamp string.
    pub fn parse(raw: &str) -> Self {
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Self::Parsed(at.with_timezone(&Utc));
        }
        let naive = raw.trim_end_matches('Z');
        NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
            .map_or_else(|_| Self::Raw(raw.to_owned()), |at| Self::Parsed(at.and_utc()))
    }

    /// The parsed instant, if parsing succeeded.
    pub const fn parsed(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Parsed(at) => Some(*at),
            Self::Raw(_) => None,
        }
    }
}

/// One validated item of an `M` list.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Topic the delta applies to.
    pub topic: Topic,
    /// The delta, always a JSON object.
    pub payload: Value,
    /// Upstream timestamp.
    pub timestamp: SourceTimestamp,
}

/// A decoded frame, split into its bulk and incremental parts.
#[derive(Debug, Default)]
pub struct Frame {
    /// `R` entries in key order.
    pub bulk: Vec<(Topic, Value)>,
    /// `M` items in list order; invalid items are kept as errors so the
    /// caller can log them and carry on with the rest.
    pub updates: Vec<Result<Update, CoreError>>,
}

impl Frame {
    /// Whether the frame carried neither bulk nor incremental data.
    pub fn is_empty(&self) -> bool {
        self.bulk.is_empty() && self.updates.is_empty()
    }
}

/// Repair, decode and classify one raw frame.
pub fn parse(raw: &str) -> Result<Frame, CoreError> {
    match dialect::decode(raw)? {
        Value::Object(mut root) => Ok(Frame {
            bulk: root.remove("R").map(bulk_entries).unwrap_or_default(),
            updates: root.remove("M").map(update_items).unwrap_or_default(),
        }),
        other => Err(CoreError::ShapeValidation(format!(
            "frame is {} rather than an object",
            kind(&other)
        ))),
    }
}

fn bulk_entries(value: Value) -> Vec<(Topic, Value)> {
    match value {
        Value::Object(entries) => entries
            .into_iter()
            .map(|(topic, payload)| (Topic::from(topic), payload))
            .collect(),
        _ => Vec::new(),
    }
}

fn update_items(value: Value) -> Vec<Result<Update, CoreError>> {
    match value {
        Value::Array(items) => items.into_iter().map(update_item).collect(),
        other => vec![Err(CoreError::ShapeValidation(format!(
            "M is {} rather than a list",
            kind(&other)
        )))],
    }
}

fn update_item(item: Value) -> Result<Update, CoreError> {
    let Value::Object(mut fields) = item else {
        return Err(CoreError::ShapeValidation("M item is not an object".to_owned()));
    };
    let args = take_args(&mut fields)?;
    let [topic, payload, timestamp] = <[Value; 3]>::try_from(args).map_err(|args| {
        CoreError::ShapeValidation(format!("A has {} elements, expected 3", args.len()))
    })?;

    match (topic, payload, timestamp) {
        (Value::String(topic), payload @ Value::Object(_), Value::String(timestamp)) => Ok(Update {
            topic: Topic::from(topic),
            payload,
            timestamp: SourceTimestamp::parse(&timestamp),
        }),
        (topic, payload, timestamp) => Err(CoreError::ShapeValidation(format!(
            "A is [{}, {}, {}], expected [string, object, string]",
            kind(&topic),
            kind(&payload),
            kind(&timestamp)
        ))),
    }
}

fn take_args(fields: &mut Map<String, Value>) -> Result<Vec<Value>, CoreError> {
    match fields.remove("A") {
        Some(Value::Array(args)) => Ok(args),
        Some(other) => Err(CoreError::ShapeValidation(format!(
            "A is {} rather than a list",
            kind(&other)
        ))),
        None => Err(CoreError::ShapeValidation("M item has no A field".to_owned())),
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn bulk_snapshot_splits_per_topic() {
        let frame = parse(r#"{"R": {"DriverList": {"44": {"Tla": "HAM"}}, "SessionInfo": {"Name": "Race"}}}"#).unwrap();
        let topics: Vec<&str> = frame.bulk.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(topics, vec!["DriverList", "SessionInfo"]);
        assert!(frame.updates.is_empty());
    }

    #[test]
    fn incremental_items_are_validated_individually() {
        let raw = r#"{"M": [
            {"H": "Streaming", "M": "feed", "A": ["TimingData", {"Lines": {}}, "2024-03-02T15:04:05.123Z"]},
            {"A": ["TimingData", "not an object", "2024-03-02T15:04:05Z"]},
            {"A": ["TrackStatus", {"Status": "1"}]},
            {"nothing": true}
        ]}"#;
        let frame = parse(raw).unwrap();
        assert_eq!(frame.updates.len(), 4);

        let first = frame.updates.first().unwrap().as_ref().unwrap();
        assert_eq!(first.topic.as_str(), "TimingData");
        assert_eq!(first.payload, json!({"Lines": {}}));
        assert!(first.timestamp.parsed().is_some());

        assert!(frame.updates.iter().skip(1).all(|item| matches!(item, Err(CoreError::ShapeValidation(_)))));
    }

    #[test]
    fn python_dialect_frames_decode() {
        let frame = parse("{'M': [{'A': ['TrackStatus', {'Status': '1', 'Yellow': False}, '2024-03-02T15:04:05Z']}]}").unwrap();
        let update = frame.updates.into_iter().next().unwrap().unwrap();
        assert_eq!(update.payload, json!({"Status": "1", "Yellow": false}));
    }

    #[test]
    fn heartbeat_and_acks_carry_nothing() {
        assert!(parse("{}").unwrap().is_empty());
        assert!(parse(r#"{"I": "1"}"#).unwrap().is_empty());
        assert!(parse(r#"{"C": "d-1", "M": []}"#).unwrap().is_empty());
    }

    #[test]
    fn non_object_frames_fail_validation() {
        assert!(matches!(parse("[1, 2]"), Err(CoreError::ShapeValidation(_))));
        assert!(matches!(parse("{not json"), Err(CoreError::MalformedPayload { .. })));
    }

    #[test]
    fn timestamps_parse_with_or_without_zone() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 2, 15, 4, 5).unwrap();
        assert_eq!(SourceTimestamp::parse("2024-03-02T15:04:05Z").parsed(), Some(expected));
        assert_eq!(SourceTimestamp::parse("2024-03-02T15:04:05").parsed(), Some(expected));
        assert!(SourceTimestamp::parse("2024-03-02T15:04:05.4410883Z").parsed().is_some());
        assert_eq!(
            SourceTimestamp::parse("yesterday"),
            SourceTimestamp::Raw("yesterday".to_owned())
        );
    }
}
