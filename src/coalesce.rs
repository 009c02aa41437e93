//! Field coalescing.
//!
//! Rows reach the UI from the live API (snake_case), from richer detail
//! calls, and from seed/fallback data (camelCase, alternate names). Every
//! display value is resolved by walking an ordered list of candidate keys.
//! All functions here are total: a malformed record yields defaults.

use serde_json::{Map, Value};

use crate::record::RecordId;

/// First candidate key present on `record` whose value is not null.
pub fn resolve<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

/// [`resolve`] with a fallback for when no candidate matches.
pub fn resolve_or(record: &Value, keys: &[&str], fallback: Value) -> Value {
    resolve(record, keys).cloned().unwrap_or(fallback)
}

/// Coerce a JSON scalar to a number. Numeric strings (`"35012.50"`) parse;
/// anything else, including non-finite results, is `0`.
pub fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Numeric coalescing: first non-null candidate, coerced; `0` when absent.
pub fn resolve_number(record: &Value, keys: &[&str]) -> f64 {
    resolve(record, keys).map(coerce_number).unwrap_or(0.0)
}

/// Like [`resolve_number`] but distinguishes "absent" from zero.
pub fn resolve_number_opt(record: &Value, keys: &[&str]) -> Option<f64> {
    resolve(record, keys).map(coerce_number)
}

/// Text coalescing. Blank strings fall through to the next candidate;
/// numbers and booleans are rendered as text.
pub fn resolve_text(record: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match record.get(*key) {
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
            Some(Value::Number(n)) => return Some(n.to_string()),
            Some(Value::Bool(b)) => return Some(b.to_string()),
            _ => {}
        }
    }
    None
}

/// Boolean coalescing with the lenient encodings upstream sources use
/// (`1`/`0`, `"yes"`, `"on"`, `"true"`).
pub fn resolve_bool(record: &Value, keys: &[&str]) -> Option<bool> {
    for key in keys {
        let value = match record.get(*key) {
            Some(value) => value,
            None => continue,
        };

        if let Some(flag) = value.as_bool() {
            return Some(flag);
        }
        if let Some(flag) = value.as_i64() {
            return Some(flag == 1);
        }
        if let Some(flag) = value.as_str() {
            let normalized = flag.trim().to_ascii_lowercase();
            if matches!(normalized.as_str(), "true" | "1" | "yes" | "on" | "active") {
                return Some(true);
            }
            if matches!(normalized.as_str(), "false" | "0" | "no" | "off" | "inactive") {
                return Some(false);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Declarative display tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Trimmed text, default `""`.
    Text,
    /// Coerced number, default `0`.
    Number,
    /// Lenient boolean, default `false`.
    Bool,
    /// Value copied as-is, default `null`.
    Raw,
}

/// One row of a coalescing table: display field and its candidate keys.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub keys: &'static [&'static str],
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn text(name: &'static str, keys: &'static [&'static str]) -> Self {
        Self {
            name,
            keys,
            kind: FieldKind::Text,
        }
    }

    pub const fn number(name: &'static str, keys: &'static [&'static str]) -> Self {
        Self {
            name,
            keys,
            kind: FieldKind::Number,
        }
    }

    pub const fn flag(name: &'static str, keys: &'static [&'static str]) -> Self {
        Self {
            name,
            keys,
            kind: FieldKind::Bool,
        }
    }

    pub const fn raw(name: &'static str, keys: &'static [&'static str]) -> Self {
        Self {
            name,
            keys,
            kind: FieldKind::Raw,
        }
    }

    pub fn resolve(&self, record: &Value) -> Value {
        match self.kind {
            FieldKind::Text => Value::String(resolve_text(record, self.keys).unwrap_or_default()),
            FieldKind::Number => number_value(resolve_number(record, self.keys)),
            FieldKind::Bool => Value::Bool(resolve_bool(record, self.keys).unwrap_or(false)),
            FieldKind::Raw => resolve_or(record, self.keys, Value::Null),
        }
    }
}

/// Build a display-ready row: `id` plus every field of the table.
pub fn project(record: &Value, fields: &[FieldSpec]) -> Value {
    let mut row = Map::new();
    row.insert(
        "id".to_string(),
        RecordId::of(record)
            .map(|id| id.to_value())
            .unwrap_or(Value::Null),
    );
    for field in fields {
        row.insert(field.name.to_string(), field.resolve(record));
    }
    Value::Object(row)
}

/// JSON number for an `f64`, keeping integral values as integers so rows
/// serialise as `3500` rather than `3500.0`.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0))
    }
}
