//! Strict JSON decoding of response bodies.

use serde_json::Value;
use thiserror::Error;

const PREVIEW_LIMIT: usize = 200;

/// Parse a response body into JSON, reporting the status and a body preview on
/// failure.
///
/// An empty (or whitespace-only) body decodes to `Value::Null`, since
/// operations without a response schema commonly return nothing.
pub fn parse_response_json_strict(text: &str, status: Option<u16>) -> Result<Value, JsonParseError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str::<Value>(text).map_err(|error| {
        let status_note = status
            .map(|code| format!("status {code}"))
            .unwrap_or_else(|| "unknown status".to_string());
        JsonParseError::new(status_note, error, truncate_response_preview(text, PREVIEW_LIMIT))
    })
}

fn truncate_response_preview(text: &str, limit: usize) -> String {
    let mut preview = String::new();
    for ch in text.chars() {
        if preview.len() >= limit {
            preview.push_str("...");
            break;
        }
        match ch {
            '\n' | '\r' | '\t' => {
                if !preview.ends_with(' ') {
                    preview.push(' ');
                }
            }
            _ => preview.push(ch),
        }
    }
    preview.trim().to_string()
}

/// Error returned when strict JSON parsing of a response fails.
#[derive(Debug, Error)]
#[error("failed to parse JSON response ({status_note}): {source}. body preview: {body_preview}")]
pub struct JsonParseError {
    status_note: String,
    #[source]
    source: serde_json::Error,
    body_preview: String,
}

impl JsonParseError {
    pub fn new(status_note: String, source: serde_json::Error, body_preview: String) -> Self {
        Self {
            status_note,
            source,
            body_preview,
        }
    }

    /// Truncated response preview captured during parsing.
    pub fn body_preview(&self) -> &str {
        &self.body_preview
    }
}
