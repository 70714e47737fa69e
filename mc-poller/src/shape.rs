//! Turning read results into output messages

use crate::config::OutputFormat;
use mc_core::{PlcValue, ReadValues};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Topic carried by every poller message
pub const READ_TOPIC: &str = "mc-read";

/// One poller output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadMessage {
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub topic: String,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReadMessage {
    pub fn new(payload: Value) -> Self {
        Self {
            timestamp: now_millis(),
            topic: READ_TOPIC.to_string(),
            payload,
            error: None,
        }
    }

    /// Error message with a null payload
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(Value::Null)
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub fn to_json(value: &PlcValue) -> Value {
    match value {
        PlcValue::Bool(b) => Value::Bool(*b),
        PlcValue::Int(n) => Value::Number((*n).into()),
        PlcValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        PlcValue::Text(s) => Value::String(s.clone()),
        PlcValue::List(items) => Value::Array(items.iter().map(to_json).collect()),
    }
}

/// Empty payload for the given format
pub fn empty_payload(format: OutputFormat) -> Value {
    match format {
        OutputFormat::Json => Value::Object(Map::new()),
        OutputFormat::Array => Value::Array(Vec::new()),
    }
}

/// Pair read values with the requested addresses
///
/// Positional values are zipped with `names`, a missing value becomes
/// `null`. Keyed values keep their own keys. A single value is attached to
/// the first name, or dropped when there is none.
pub fn shape_payload(names: &[String], values: &ReadValues, format: OutputFormat) -> Value {
    let pairs: Vec<(String, Value)> = match values {
        ReadValues::Positional(list) => names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), list.get(i).map(to_json).unwrap_or(Value::Null)))
            .collect(),
        ReadValues::Keyed(entries) => entries
            .iter()
            .map(|(key, value)| (key.clone(), to_json(value)))
            .collect(),
        ReadValues::Single(value) => names
            .first()
            .map(|name| vec![(name.clone(), to_json(value))])
            .unwrap_or_default(),
    };

    match format {
        OutputFormat::Json => Value::Object(pairs.into_iter().collect()),
        OutputFormat::Array => Value::Array(
            pairs
                .into_iter()
                .map(|(key, value)| {
                    let mut object = Map::new();
                    object.insert(key, value);
                    Value::Object(object)
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_positional_json_pads_missing_with_null() {
        let values = ReadValues::Positional(vec![PlcValue::Int(5)]);
        let payload = shape_payload(&names(&["D100", "D101"]), &values, OutputFormat::Json);
        assert_eq!(payload, json!({"D100": 5, "D101": null}));
    }

    #[test]
    fn test_positional_array() {
        let values = ReadValues::Positional(vec![PlcValue::Int(5), PlcValue::Bool(true)]);
        let payload = shape_payload(&names(&["D100", "M0"]), &values, OutputFormat::Array);
        assert_eq!(payload, json!([{"D100": 5}, {"M0": true}]));
    }

    #[test]
    fn test_keyed_values_keep_their_keys() {
        let values = ReadValues::Keyed(vec![
            ("D1".to_string(), PlcValue::Float(1.5)),
            ("D2".to_string(), PlcValue::Text("ok".to_string())),
        ]);
        let unused = names(&["X0"]);
        assert_eq!(
            shape_payload(&unused, &values, OutputFormat::Json),
            json!({"D1": 1.5, "D2": "ok"})
        );
        assert_eq!(
            shape_payload(&unused, &values, OutputFormat::Array),
            json!([{"D1": 1.5}, {"D2": "ok"}])
        );
    }

    #[test]
    fn test_single_value_goes_to_first_name() {
        let values = ReadValues::Single(PlcValue::Int(42));
        assert_eq!(
            shape_payload(&names(&["D0", "D1"]), &values, OutputFormat::Json),
            json!({"D0": 42})
        );
        assert_eq!(
            shape_payload(&[], &values, OutputFormat::Array),
            json!([])
        );
    }

    #[test]
    fn test_nested_and_non_finite() {
        let values = ReadValues::Single(PlcValue::List(vec![
            PlcValue::Int(1),
            PlcValue::Float(f64::NAN),
        ]));
        assert_eq!(
            shape_payload(&names(&["D0"]), &values, OutputFormat::Json),
            json!({"D0": [1, null]})
        );
    }

    #[test]
    fn test_failure_message() {
        let msg = ReadMessage::failure("boom");
        assert_eq!(msg.topic, READ_TOPIC);
        assert_eq!(msg.payload, Value::Null);
        assert_eq!(msg.error.as_deref(), Some("boom"));
        assert!(msg.timestamp > 0);

        let encoded = serde_json::to_value(ReadMessage::new(json!({}))).unwrap();
        assert!(encoded.get("error").is_none());
    }
}
