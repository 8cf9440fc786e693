//! Tolerant field decoders for generator output.
//!
//! The generator routinely emits numbers as strings, `"NaN"`, or `null`.
//! These helpers accept all of them so a malformed field becomes a violation
//! later instead of a parse failure now.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Serde default for required numeric fields that were omitted.
pub(crate) fn nan() -> f64 {
    f64::NAN
}

/// Read a JSON value as a number, keeping non-finite results.
///
/// Numeric strings (including `"NaN"` and `"Infinity"`) are parsed.
/// Anything else is `None`.
pub(crate) fn number_raw(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.to_ascii_lowercase().as_str() {
                "nan" => Some(f64::NAN),
                "infinity" | "+infinity" | "inf" => Some(f64::INFINITY),
                "-infinity" | "-inf" => Some(f64::NEG_INFINITY),
                _ => trimmed.parse::<f64>().ok(),
            }
        }
        _ => None,
    }
}

/// Read a JSON value as a finite number.
pub(crate) fn finite_number(value: &Value) -> Option<f64> {
    number_raw(value).filter(|n| n.is_finite())
}

/// Convert a number back to JSON. Non-finite values become `null`.
pub(crate) fn number_value(n: f64) -> Value {
    serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
}

/// Deserialize a required `f64`, mapping anything unreadable to NaN.
pub(crate) fn f64_or_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_raw(&value).unwrap_or(f64::NAN))
}

/// Deserialize an optional `f64`, mapping anything unreadable to `None`.
pub(crate) fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_raw(&value))
}

/// Deserialize an optional string, rendering numbers and booleans as text.
pub(crate) fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(string_lossy(&value))
}

/// Deserialize a required string. Unreadable values become empty, which
/// never matches a node id.
pub(crate) fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(string_lossy(&value).unwrap_or_default())
}

/// Render a scalar JSON value as text.
pub(crate) fn string_lossy(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
