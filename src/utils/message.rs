//! Helpers for stamping messages and reading loosely-typed payload maps.

use std::collections::HashMap;

use serde_json::Value;

/// Current wall-clock time as float seconds since the Unix epoch.
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// A fresh unique identifier (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Read a string entry from a payload map.
pub fn get_str<'a>(map: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

/// Read a list of strings from a payload map.
///
/// Accepts either a JSON array of strings or a single string; anything else
/// yields an empty list.
pub fn get_string_list(map: &HashMap<String, Value>, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Build a payload map from `(key, value)` pairs.
pub fn payload_map<I, K>(entries: I) -> HashMap<String, Value>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_list_accepts_array_or_scalar() {
        let map = payload_map([("tags", json!(["a", "b", 3])), ("name", json!("echo"))]);
        assert_eq!(get_string_list(&map, "tags"), vec!["a", "b"]);
        assert_eq!(get_string_list(&map, "name"), vec!["echo"]);
        assert!(get_string_list(&map, "missing").is_empty());
    }

    #[test]
    fn timestamps_are_seconds() {
        let ts = now_timestamp();
        assert!(ts > 1_600_000_000.0);
    }
}
