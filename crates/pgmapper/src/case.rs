//! snake_case ⇄ camelCase key conversion for JSON-shaped values.
//!
//! Storage uses snake_case column names while application types use camelCase
//! field names. These helpers rewrite every object key, recursively through
//! nested objects and arrays. Scalars and `null` pass through unchanged.
//!
//! This is a best-effort convention mapper, not a lossless codec: keys with
//! consecutive capitals or digits after underscores do not round-trip.

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::LazyLock;

static SNAKE_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new("_([a-z])").expect("valid regex"));
static UPPER_CHAR: LazyLock<Regex> = LazyLock::new(|| Regex::new("[A-Z]").expect("valid regex"));

/// Convert a single snake_case key to camelCase.
///
/// Every `_x` where `x` is a lowercase ASCII letter becomes `X`. Other
/// underscores are left alone.
pub fn snake_to_camel_key(key: &str) -> String {
    SNAKE_SEGMENT
        .replace_all(key, |caps: &Captures<'_>| caps[1].to_ascii_uppercase())
        .into_owned()
}

/// Convert a single camelCase key to snake_case.
///
/// Every uppercase ASCII letter becomes `_` followed by its lowercase form.
pub fn camel_to_snake_key(key: &str) -> String {
    UPPER_CHAR
        .replace_all(key, |caps: &Captures<'_>| format!("_{}", caps[0].to_ascii_lowercase()))
        .into_owned()
}

/// Rewrite every object key in `value` from snake_case to camelCase.
pub fn snake_to_camel(value: Value) -> Value {
    map_keys(value, &snake_to_camel_key)
}

/// Rewrite every object key in `value` from camelCase to snake_case.
pub fn camel_to_snake(value: Value) -> Value {
    map_keys(value, &camel_to_snake_key)
}

/// Rewrite the keys of a single decoded row from snake_case to camelCase.
pub fn record_to_camel(record: Map<String, Value>) -> Map<String, Value> {
    map_object(record, &snake_to_camel_key)
}

fn map_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(map_object(map, rename)),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| map_keys(v, rename)).collect()),
        scalar => scalar,
    }
}

fn map_object(map: Map<String, Value>, rename: &dyn Fn(&str) -> String) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| (rename(&key), map_keys(value, rename)))
        .collect()
}
