//! JSON rendering for anything the facade returns

use serde::Serialize;
use serde_json::Value;

/// Render a result as a JSON value
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Value> {
    serde_json::to_value(value)
}

/// Render a result as a pretty-printed JSON string
pub fn render_json_string<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Render a result as a compact JSON string (no whitespace)
pub fn render_json_compact<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}
