//! Lenient decoding of status API payloads.
//!
//! The API shape is only loosely known, so nothing here fails. Unexpected
//! shapes settle to an empty roster or a zero count.

use serde_json::{Map, Value};

/// Field holding the count when the count endpoint answers with an object.
pub const COUNT_FIELD: &str = "count";

/// The shapes the count endpoint is known to answer with.
#[derive(Debug, Clone, PartialEq)]
pub enum CountPayload {
    /// A bare JSON number.
    Number(f64),
    /// An object, expected to carry [`COUNT_FIELD`].
    Object(Map<String, Value>),
    /// Anything else, coerced as a whole.
    Other(Value),
}

impl CountPayload {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::Object(map) => Self::Object(map),
            other => Self::Other(other),
        }
    }

    /// Numeric value of the payload, NaN when nothing numeric can be found.
    pub fn resolve(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Object(map) => match map.get(COUNT_FIELD) {
                Some(field) => coerce_number(field),
                // An object without the field coerces to NaN as a whole.
                None => f64::NAN,
            },
            Self::Other(value) => coerce_number(value),
        }
    }
}

/// Loose "to number" conversion of a JSON value.
///
/// `null` is 0, booleans are 0 or 1, strings parse after trimming (empty is 0),
/// arrays of zero or one element follow their single element, everything else
/// is NaN.
pub fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => coerce_str(s),
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            // A one-element array coerces through its text form, where
            // booleans and objects are no longer numeric.
            [Value::Bool(_) | Value::Object(_)] => f64::NAN,
            [single] => coerce_number(single),
            _ => f64::NAN,
        },
        Value::Object(_) => f64::NAN,
    }
}

fn coerce_str(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Settle a coerced value into a player count.
pub fn settle_count(value: f64) -> u32 {
    if !value.is_finite() || value < 0.0 {
        return 0;
    }
    // Saturating float-to-int cast, fractions truncate.
    value as u32
}

/// Decode the count endpoint body. Bodies that are not JSON are coerced as text.
pub fn decode_count(body: &str) -> u32 {
    let value = serde_json::from_str::<Value>(body)
        .unwrap_or_else(|_| Value::String(body.to_string()));
    settle_count(CountPayload::from_value(value).resolve())
}

/// Decode the player list body. Anything but a JSON array is an empty roster.
///
/// String entries are kept, numeric entries keep their text form, other
/// entries are skipped.
pub fn decode_players(body: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(name) => Some(name),
                Value::Number(n) => Some(n.to_string()),
                other => {
                    tracing::debug!(entry = %other, "skipping non-name roster entry");
                    None
                }
            })
            .collect(),
        Ok(other) => {
            tracing::debug!(kind = json_kind(&other), "player list is not an array");
            Vec::new()
        }
        Err(e) => {
            tracing::debug!(error = %e, "player list is not valid json");
            Vec::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
