//! Helpers shared by the JSON export parsers and the detector.

use serde_json::Value;

/// JavaScript-style truthiness: `null`, `false`, `0` and `""` are falsy,
/// arrays and objects are always truthy. Export tools write optional
/// fields in all of these shapes.
pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// First truthy field that renders as text (strings, or numbers for
/// numeric user ids).
pub(crate) fn first_text(candidates: &[Option<&Value>]) -> Option<String> {
    candidates
        .iter()
        .copied()
        .filter(|v| is_truthy(*v))
        .find_map(|v| match v? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Parse a document that must be a JSON value; malformed JSON is `None`.
pub(crate) fn parse_document(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}
