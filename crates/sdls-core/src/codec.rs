//! Text ⇄ tree conversion.
//!
//! The in-memory tree is [`serde_json::Value`] built with `preserve_order`, so
//! serialized output keeps mold key order. Key order carries no meaning to the
//! engine; it only keeps output readable next to the authored input.

use serde_json::Value;

use crate::error::ParseError;

/// A JSON tree.
pub type JsonValue = Value;

/// A JSON object (ordered map of string keys).
pub type JsonObject = serde_json::Map<String, Value>;

/// Parse any JSON value.
///
/// # Errors
/// Returns [`ParseError::Syntax`] on malformed input, including empty text.
pub fn parse(text: &str) -> Result<JsonValue, ParseError> {
    Ok(serde_json::from_str(text)?)
}

/// Parse text that must be a JSON object.
///
/// # Errors
/// Returns [`ParseError::Syntax`] on malformed input and
/// [`ParseError::NotAnObject`] when the root is an array or scalar.
pub fn parse_object(text: &str) -> Result<JsonObject, ParseError> {
    match parse(text)? {
        Value::Object(fields) => Ok(fields),
        other => Err(ParseError::NotAnObject {
            found: kind_name(&other),
        }),
    }
}

/// Compact serialization.
#[must_use]
pub fn serialize(value: &JsonValue) -> String {
    value.to_string()
}

/// Indented serialization for human-facing files.
#[must_use]
pub fn serialize_pretty(value: &JsonValue) -> String {
    format!("{value:#}")
}

/// Short name of a value's JSON type, for diagnostics.
#[must_use]
pub const fn kind_name(value: &JsonValue) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Structural equality where numbers compare by numeric value, so `1` and
/// `1.0` are the same.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn same_value(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x == y {
                return true;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(fx), Some(fy)) => fx == fy,
                _ => false,
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_value(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| same_value(x, y)))
        }
        _ => a == b,
    }
}
