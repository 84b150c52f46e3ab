//! Normalization of loosely-typed generation payloads into plain text.
//!
//! Text-generation endpoints answer with a bare string, a single object
//! carrying `generated_text`, or a list of such objects depending on the
//! model's pipeline. [`GenerationPayload`] tags the shape once; [`normalize`]
//! then applies a fixed rule:
//!
//! 1. A sequence contributes its first element.
//! 2. An object with a string `generated_text` contributes that value.
//! 3. Anything else is rendered as a string (strings as-is, the rest as JSON).
//!
//! [`normalize`]: GenerationPayload::normalize

use serde_json::{Map, Value};

/// Field carrying the generated text in object-shaped payloads.
pub const GENERATED_TEXT_FIELD: &str = "generated_text";

/// A provider response, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationPayload {
    Text(String),
    Object(Map<String, Value>),
    Sequence(Vec<Value>),
    /// Numbers, booleans, `null`.
    Other(Value),
}

impl From<Value> for GenerationPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => GenerationPayload::Text(s),
            Value::Object(map) => GenerationPayload::Object(map),
            Value::Array(items) => GenerationPayload::Sequence(items),
            other => GenerationPayload::Other(other),
        }
    }
}

impl GenerationPayload {
    /// Parse a raw response body. Bodies that are not JSON at all are kept
    /// as text so the caller still gets a best-effort rendering.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => value.into(),
            Err(_) => GenerationPayload::Text(body.to_string()),
        }
    }

    /// Collapse the payload to plain text. Never fails.
    pub fn normalize(self) -> String {
        match self {
            GenerationPayload::Sequence(items) => {
                if items.is_empty() {
                    return render(&Value::Array(items));
                }
                let first = items.into_iter().next().unwrap_or(Value::Null);
                match GenerationPayload::from(first) {
                    // Nested sequences are rendered, not unwrapped again.
                    GenerationPayload::Sequence(inner) => render(&Value::Array(inner)),
                    element => element.normalize(),
                }
            }
            GenerationPayload::Object(map) => match map.get(GENERATED_TEXT_FIELD) {
                Some(Value::String(text)) => text.clone(),
                _ => render(&Value::Object(map)),
            },
            GenerationPayload::Text(s) => s,
            GenerationPayload::Other(v) => render(&v),
        }
    }

    /// The provider's `error` message when the payload is an error envelope
    /// rather than a generation (an object with `error` and no generated text).
    pub fn provider_error(&self) -> Option<String> {
        let GenerationPayload::Object(map) = self else {
            return None;
        };
        if map.contains_key(GENERATED_TEXT_FIELD) {
            return None;
        }
        match map.get("error")? {
            Value::String(msg) => Some(msg.clone()),
            Value::Array(msgs) => Some(
                msgs.iter()
                    .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            other => Some(other.to_string()),
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
