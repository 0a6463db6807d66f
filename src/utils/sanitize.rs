//! Sanitization of text destined for database JSON columns.
//!
//! SQLite stores the mission context as a JSON blob; null characters and
//! other control characters corrupt downstream consumers (and break
//! PostgreSQL JSONB when operators point MAESTRO at one). Tabs, newlines,
//! and carriage returns are kept.

use serde_json::Value;

/// Strips control characters (0x00-0x08, 0x0B, 0x0C, 0x0E-0x1F) from a string.
pub fn sanitize_text(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}'))
        .collect()
}

/// Recursively sanitizes every string in a JSON value, including map keys.
pub fn sanitize_json(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_text(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_json).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (sanitize_text(&k), sanitize_json(v)))
                .collect(),
        ),
        other => other,
    }
}
