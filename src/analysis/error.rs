use serde::Serialize;
use serde_json::{json, Value};

use crate::analysis::parser::{ParseError, SENTINEL_VALUE};
use crate::llm::gateway::UpstreamError;

const GENERIC_INTERNAL_MESSAGE: &str = "Analysis failed. Please try again later.";
const CONTENT_REJECTED_MESSAGE: &str =
    "The image does not look like a chat screenshot. Please upload a screenshot of a conversation.";

/// Every way a request can fail inside the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("invalid input on {field}: {reason}")]
    Input { field: &'static str, reason: String },
    #[error("model rejected the image as non-conversation content")]
    ContentRejected,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("model returned unparseable output: {0}")]
    Format(ParseError),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl AnalysisError {
    pub fn input(field: &'static str, reason: impl Into<String>) -> Self {
        AnalysisError::Input {
            field,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Input { .. } => ErrorKind::Input,
            AnalysisError::ContentRejected => ErrorKind::ContentRejected,
            AnalysisError::Upstream(_) => ErrorKind::Upstream,
            AnalysisError::Format(_) => ErrorKind::Format,
            AnalysisError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<ParseError> for AnalysisError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidJson { .. } => AnalysisError::Format(err),
            ParseError::NotAnObject { .. } => AnalysisError::Internal(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    ContentRejected,
    Upstream,
    Format,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Input => "input",
            ErrorKind::ContentRejected => "content_rejected",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Format => "format",
            ErrorKind::Internal => "internal",
        }
    }

    pub const fn code(self) -> ErrorCode {
        match self {
            ErrorKind::Input | ErrorKind::ContentRejected => ErrorCode::InvalidArgument,
            ErrorKind::Upstream | ErrorKind::Format | ErrorKind::Internal => ErrorCode::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "invalid-argument")]
    InvalidArgument,
    #[serde(rename = "internal")]
    Internal,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "invalid-argument",
            ErrorCode::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorEnvelope {
    pub fn invalid_argument(message: impl Into<String>, details: Option<Value>) -> Self {
        ErrorEnvelope {
            code: ErrorCode::InvalidArgument,
            message: message.into(),
            details,
        }
    }

    pub fn internal() -> Self {
        ErrorEnvelope {
            code: ErrorCode::Internal,
            message: GENERIC_INTERNAL_MESSAGE.to_string(),
            details: None,
        }
    }
}

/// Maps an internal failure onto the public taxonomy. Only caller-fixable
/// errors carry detail; everything else collapses to the generic internal
/// envelope.
pub fn classify(err: &AnalysisError) -> ErrorEnvelope {
    match err {
        AnalysisError::Input { field, reason } => ErrorEnvelope::invalid_argument(
            format!("{field}: {reason}"),
            Some(json!({ "field": field })),
        ),
        AnalysisError::ContentRejected => ErrorEnvelope::invalid_argument(
            CONTENT_REJECTED_MESSAGE,
            Some(json!({ "reason": SENTINEL_VALUE })),
        ),
        AnalysisError::Upstream(_) | AnalysisError::Format(_) | AnalysisError::Internal(_) => {
            ErrorEnvelope::internal()
        }
    }
}
