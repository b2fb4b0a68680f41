//! Field decoders for upstream order payloads.
//!
//! Each helper accepts `null` and mistyped scalars and falls back to the
//! field's empty value, so one odd field never rejects the whole record or
//! the batch it arrived in.

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

/// Text field. Numbers and booleans keep their textual form.
pub(crate) fn string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(scalar_text(Value::deserialize(de)?).unwrap_or_default())
}

/// Optional text field. `null` and blank strings are `None`.
pub(crate) fn opt_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(scalar_text(Value::deserialize(de)?).filter(|s| !s.trim().is_empty()))
}

pub(crate) fn float<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    })
}

pub(crate) fn int<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

pub(crate) fn uint<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Number(n) => n.as_u64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

/// Nested object. Anything that is not a decodable object becomes `T::default()`.
pub(crate) fn object<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(match Value::deserialize(de)? {
        v @ Value::Object(_) => T::deserialize(v).unwrap_or_default(),
        _ => T::default(),
    })
}

/// Array of records. `null` is an empty list; elements that are not objects
/// are skipped.
pub(crate) fn list<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(de)? {
        Value::Array(items) => records(items),
        _ => Vec::new(),
    })
}

pub(crate) fn records<T: DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|v| T::deserialize(v).ok())
        .collect()
}

fn scalar_text(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
