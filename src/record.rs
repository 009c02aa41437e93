//! Record identity.
//!
//! Records are opaque JSON objects; the only field the data layer relies on
//! is `id`, which upstream sources serialise either as an integer or as a
//! string. Numeric strings are folded into integers so `5` and `"5"` name the
//! same record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Read an id from a JSON scalar. Returns `None` for null, empty strings,
    /// and non-scalar values.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(RecordId::Int),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self::from(trimmed))
                }
            }
            _ => None,
        }
    }

    /// The id of a record (its `id` field).
    pub fn of(record: &Value) -> Option<Self> {
        record.get("id").and_then(Self::from_value)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            RecordId::Int(n) => Some(*n),
            RecordId::Text(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Text(s) => Value::String(s.clone()),
        }
    }

    /// True when `record` carries this id.
    pub fn matches(&self, record: &Value) -> bool {
        Self::of(record).as_ref() == Some(self)
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        match s.trim().parse::<i64>() {
            Ok(n) => RecordId::Int(n),
            Err(_) => RecordId::Text(s.trim().to_string()),
        }
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings_fold_into_integers() {
        assert_eq!(RecordId::from_value(&json!("42")), Some(RecordId::Int(42)));
        assert_eq!(RecordId::from_value(&json!(42)), Some(RecordId::Int(42)));
        assert_eq!(
            RecordId::from_value(&json!("PRF-0042")),
            Some(RecordId::Text("PRF-0042".into()))
        );
    }

    #[test]
    fn missing_or_blank_ids_are_none() {
        assert_eq!(RecordId::of(&json!({ "name": "x" })), None);
        assert_eq!(RecordId::of(&json!({ "id": null })), None);
        assert_eq!(RecordId::of(&json!({ "id": "  " })), None);
    }

    #[test]
    fn matches_across_representations() {
        let record = json!({ "id": "7" });
        assert!(RecordId::Int(7).matches(&record));
        assert!(!RecordId::Int(8).matches(&record));
    }
}
