//! Values returned by a batch read

use serde::{Deserialize, Serialize};

/// A single value read from a PLC device
///
/// The codec decides the concrete type for each address (bit devices read as
/// booleans, word devices as integers, `,r` suffixed addresses as floats,
/// string devices as text, ranged addresses as lists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlcValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<PlcValue>),
}

impl From<bool> for PlcValue {
    fn from(v: bool) -> Self {
        PlcValue::Bool(v)
    }
}

impl From<i64> for PlcValue {
    fn from(v: i64) -> Self {
        PlcValue::Int(v)
    }
}

impl From<i32> for PlcValue {
    fn from(v: i32) -> Self {
        PlcValue::Int(i64::from(v))
    }
}

impl From<f64> for PlcValue {
    fn from(v: f64) -> Self {
        PlcValue::Float(v)
    }
}

impl From<&str> for PlcValue {
    fn from(v: &str) -> Self {
        PlcValue::Text(v.to_string())
    }
}

impl From<String> for PlcValue {
    fn from(v: String) -> Self {
        PlcValue::Text(v)
    }
}

/// Result of one batch read, in whatever shape the codec produced it
///
/// Mapping values back to address names is the caller's job; the session
/// passes this through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadValues {
    /// One value per submitted address, in submission order
    Positional(Vec<PlcValue>),
    /// Values already keyed by address
    Keyed(Vec<(String, PlcValue)>),
    /// A bare value (single-address reads on some codecs)
    Single(PlcValue),
}

impl ReadValues {
    pub fn is_empty(&self) -> bool {
        match self {
            ReadValues::Positional(values) => values.is_empty(),
            ReadValues::Keyed(pairs) => pairs.is_empty(),
            ReadValues::Single(_) => false,
        }
    }

    /// Number of values carried
    pub fn len(&self) -> usize {
        match self {
            ReadValues::Positional(values) => values.len(),
            ReadValues::Keyed(pairs) => pairs.len(),
            ReadValues::Single(_) => 1,
        }
    }
}

impl From<Vec<PlcValue>> for ReadValues {
    fn from(values: Vec<PlcValue>) -> Self {
        ReadValues::Positional(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_serialization() {
        let values = vec![
            PlcValue::from(5),
            PlcValue::from(true),
            PlcValue::from(1.5),
            PlcValue::from("ABC"),
            PlcValue::List(vec![PlcValue::from(1), PlcValue::from(2)]),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[5,true,1.5,"ABC",[1,2]]"#);
    }

    #[test]
    fn test_read_values_len() {
        assert!(ReadValues::Positional(vec![]).is_empty());
        assert_eq!(ReadValues::Single(PlcValue::Int(1)).len(), 1);
        assert_eq!(
            ReadValues::Keyed(vec![("D0".into(), PlcValue::Int(1))]).len(),
            1
        );
    }
}
