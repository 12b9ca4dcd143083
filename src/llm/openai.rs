use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::llm::gateway::{ModelGateway, ModelReply, ModelRequest, TokenUsage, UpstreamError};
use crate::utils::text::truncate_for_log;
use crate::utils::timing::{log_llm_timing, TIMING_TARGET};

const PROVIDER: &str = "openai";
const ERROR_BODY_LOG_LIMIT: usize = 2000;

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Chat-completions client shared by every request for the process lifetime.
pub struct OpenAiGateway {
    client: Client,
    settings: GatewaySettings,
}

impl OpenAiGateway {
    pub fn new(client: Client, settings: GatewaySettings) -> Self {
        OpenAiGateway { client, settings }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn build_payload(&self, request: &ModelRequest) -> Value {
        json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": request.system_prompt },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": request.user_text },
                        { "type": "image_url", "image_url": { "url": request.image_data_uri } }
                    ]
                }
            ]
        })
    }

    async fn send(&self, payload: &Value) -> Result<Value, UpstreamError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .timeout(self.settings.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                warn!(
                    "OpenAI request failed to send: {err} (timeout={}, connect={})",
                    err.is_timeout(),
                    err.is_connect()
                );
                transport_error(&err)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message, body_summary) = summarize_error_body(&body);
            warn!("OpenAI API error: status={}, body={}", status, body_summary);
            return Err(UpstreamError {
                status: Some(status.as_u16()),
                code,
                message: message.unwrap_or(body_summary),
            });
        }

        response.json::<Value>().await.map_err(|err| {
            UpstreamError::malformed(format!("response body is not JSON: {err}"))
        })
    }
}

fn transport_error(err: &reqwest::Error) -> UpstreamError {
    let code = if err.is_timeout() {
        Some("timeout".to_string())
    } else if err.is_connect() {
        Some("connect".to_string())
    } else {
        None
    };
    UpstreamError {
        status: err.status().map(|status| status.as_u16()),
        code,
        message: err.to_string(),
    }
}

/// Returns `(provider code, provider message, bounded body)` for a failed call.
fn summarize_error_body(body: &str) -> (Option<String>, Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let code = value
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .or_else(|| value.pointer("/error/type").and_then(|v| v.as_str()))
            .map(|v| v.to_string());
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .or_else(|| value.get("message").and_then(|v| v.as_str()))
            .map(|v| v.to_string());
        return (
            code,
            message,
            truncate_for_log(&value.to_string(), ERROR_BODY_LOG_LIMIT),
        );
    }

    (None, None, truncate_for_log(trimmed, ERROR_BODY_LOG_LIMIT))
}

/// Pulls the single message content and usage block out of a completion.
fn extract_completion(response: &Value) -> Result<(String, Option<TokenUsage>), UpstreamError> {
    let choice = response
        .get("choices")
        .and_then(|v| v.get(0))
        .ok_or_else(|| UpstreamError::malformed("response has no choices"))?;

    if let Some(refusal) = choice
        .pointer("/message/refusal")
        .and_then(|v| v.as_str())
        .filter(|v| !v.trim().is_empty())
    {
        debug!("Model refusal text: {}", truncate_for_log(refusal, 200));
    }

    let content = choice
        .pointer("/message/content")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");
    if content.is_empty() {
        let finish_reason = choice
            .get("finish_reason")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        return Err(UpstreamError::malformed(format!(
            "response message has no content (finish_reason={finish_reason})"
        )));
    }

    let usage = response
        .get("usage")
        .and_then(|v| serde_json::from_value::<TokenUsage>(v.clone()).ok());
    Ok((content.to_string(), usage))
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, UpstreamError> {
        let payload = self.build_payload(request);
        let metadata = json!({
            "system_prompt_chars": request.system_prompt.chars().count(),
            "image_uri_chars": request.image_data_uri.len(),
            "max_tokens": self.settings.max_tokens,
        });
        debug!(
            "OpenAI request: model={}, temperature={}, max_tokens={}",
            self.settings.model, self.settings.temperature, self.settings.max_tokens
        );

        let started = Instant::now();
        let (content, usage) = log_llm_timing(
            PROVIDER,
            &self.settings.model,
            "analyze_chat",
            Some(metadata),
            || async {
                let response = self.send(&payload).await?;
                extract_completion(&response)
            },
        )
        .await?;
        let duration = started.elapsed();

        if let Some(usage) = usage {
            info!(
                target: TIMING_TARGET,
                "event=llm_usage provider={} model={} prompt_tokens={} completion_tokens={} total_tokens={} duration_s={:.3}",
                PROVIDER,
                self.settings.model,
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens,
                duration.as_secs_f64()
            );
        }

        Ok(ModelReply {
            content,
            usage,
            duration,
        })
    }
}
