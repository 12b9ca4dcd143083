use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub user_text: String,
    pub image_data_uri: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct ModelReply {
    pub content: String,
    pub usage: Option<TokenUsage>,
    pub duration: Duration,
}

/// Failure talking to the model provider: transport, provider status or a
/// response that did not carry usable content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("upstream model call failed{}: {message}", origin_suffix(.status, .code))]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
}

fn origin_suffix(status: &Option<u16>, code: &Option<String>) -> String {
    let mut suffix = String::new();
    if let Some(status) = status {
        suffix.push_str(&format!(" (status {status})"));
    }
    if let Some(code) = code {
        suffix.push_str(&format!(" [{code}]"));
    }
    suffix
}

impl UpstreamError {
    pub fn malformed(message: impl Into<String>) -> Self {
        UpstreamError {
            status: None,
            code: Some("malformed_response".to_string()),
            message: message.into(),
        }
    }
}

/// One call to a vision-capable model. Implementations must not retry.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    fn provider(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, UpstreamError>;
}
