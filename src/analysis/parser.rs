use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::utils::text::truncate_for_log;

pub const SENTINEL_KEY: &str = "error";
pub const SENTINEL_VALUE: &str = "invalid_image_content";
pub const PREVIEW_CHAR_LIMIT: usize = 200;

static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*\n(.*?)\n?```$").expect("valid code fence regex")
});

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutput {
    /// The model declared the image is not a chat screenshot.
    Rejected,
    Analysis(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("model output is not valid JSON ({length} chars): {preview}")]
    InvalidJson { preview: String, length: usize },
    #[error("model output is JSON but not an object (got {kind})")]
    NotAnObject { kind: &'static str },
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match CODE_FENCE_RE.captures(trimmed).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_sentinel(object: &Map<String, Value>) -> bool {
    object.len() == 1
        && object
            .get(SENTINEL_KEY)
            .and_then(Value::as_str)
            .is_some_and(|value| value == SENTINEL_VALUE)
}

pub fn parse_model_output(raw: &str) -> Result<ParsedOutput, ParseError> {
    let text = strip_code_fence(raw);
    let value: Value = serde_json::from_str(text).map_err(|_| ParseError::InvalidJson {
        preview: truncate_for_log(raw.trim(), PREVIEW_CHAR_LIMIT),
        length: raw.chars().count(),
    })?;

    match value {
        Value::Object(object) if is_sentinel(&object) => Ok(ParsedOutput::Rejected),
        Value::Object(object) => Ok(ParsedOutput::Analysis(object)),
        other => Err(ParseError::NotAnObject {
            kind: json_kind(&other),
        }),
    }
}
