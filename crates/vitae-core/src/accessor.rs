//! Total, default-producing lookups into a nested ORCID record.
//!
//! Paths are dot-separated segments, e.g. `"activities-summary.works.group"`.
//! A segment that parses as an integer indexes into an array; on an object it
//! is treated as a plain key. Any missing key, wrong type or out-of-range index
//! resolves to the caller's default, so the extractor never has to guard
//! against ORCID's optional wrappers itself.

use serde_json::{Map, Value};

/// Conversion from a JSON node into a borrowed or copied Rust value.
pub trait FromJson<'a>: Sized {
    fn from_json(value: &'a Value) -> Option<Self>;
}

impl<'a> FromJson<'a> for &'a Value {
    fn from_json(value: &'a Value) -> Option<Self> {
        Some(value)
    }
}

impl<'a> FromJson<'a> for &'a str {
    fn from_json(value: &'a Value) -> Option<Self> {
        value.as_str()
    }
}

impl<'a> FromJson<'a> for &'a [Value] {
    fn from_json(value: &'a Value) -> Option<Self> {
        value.as_array().map(Vec::as_slice)
    }
}

impl<'a> FromJson<'a> for &'a Map<String, Value> {
    fn from_json(value: &'a Value) -> Option<Self> {
        value.as_object()
    }
}

impl FromJson<'_> for i64 {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromJson<'_> for bool {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

/// Resolve `path` below `value`, or `None` at the first segment that doesn't fit.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Null => None,
        other => Some(other),
    }
}

/// Resolve `path` and convert it to `T`, returning `default` on any mismatch.
pub fn get<'a, T: FromJson<'a>>(value: &'a Value, path: &str, default: T) -> T {
    lookup(value, path).and_then(T::from_json).unwrap_or(default)
}

/// String at `path`, or `""`.
pub fn get_str<'a>(value: &'a Value, path: &str) -> &'a str {
    get(value, path, "")
}

/// Array at `path`, or an empty slice.
pub fn get_array<'a>(value: &'a Value, path: &str) -> &'a [Value] {
    get(value, path, &[][..])
}

/// Scalar at `path` rendered as text: strings as-is, numbers formatted.
/// ORCID serialises put-codes as numbers and most other scalars as strings.
pub fn get_scalar_text(value: &Value, path: &str) -> Option<String> {
    match lookup(value, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Four-digit year at `path`. Accepts `"2024"`, `2024`, or a date-like
/// string whose first four characters are digits (`"2024-05"`).
pub fn get_year(value: &Value, path: &str) -> Option<i32> {
    match lookup(value, path)? {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => {
            let s = s.trim();
            let head = s.get(..4)?;
            if head.bytes().all(|b| b.is_ascii_digit()) {
                head.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}
