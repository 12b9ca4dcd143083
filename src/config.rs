use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use tracing::warn;
use url::Url;

use crate::analysis::SchemaVersion;
use crate::llm::openai::GatewaySettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: String,
    pub bind_addr: SocketAddr,
    pub max_request_bytes: usize,
    pub enable_cors: bool,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_temperature: f32,
    pub openai_max_tokens: u32,
    pub openai_timeout_seconds: u64,
    pub schema_version: SchemaVersion,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn normalize_schema_version(value: String) -> SchemaVersion {
    match SchemaVersion::parse(&value) {
        Some(version) => version,
        None => {
            warn!(
                "Unknown ANALYSIS_SCHEMA_VERSION value '{}'; defaulting to {}.",
                value,
                SchemaVersion::default().as_str()
            );
            SchemaVersion::default()
        }
    }
}

fn normalize_base_url(value: String) -> Result<String> {
    let trimmed = value.trim().trim_end_matches('/');
    Url::parse(trimmed).with_context(|| format!("OPENAI_BASE_URL is not a valid URL: {value}"))?;
    Ok(trimmed.to_string())
}

fn normalize_temperature(value: f32) -> f32 {
    if !(0.0..=2.0).contains(&value) {
        warn!(
            "OPENAI_TEMPERATURE {} is outside 0.0..=2.0; clamping.",
            value
        );
    }
    value.clamp(0.0, 2.0)
}

impl Config {
    pub fn load() -> Result<Self> {
        let openai_api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        if openai_api_key.trim().is_empty() {
            return Err(anyhow!("OPENAI_API_KEY is required"));
        }

        let bind_addr_raw = env_string("BIND_ADDR", "0.0.0.0:8080");
        let bind_addr = bind_addr_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| anyhow!("Invalid BIND_ADDR value: {bind_addr_raw}"))?;

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: env_string("LOG_DIR", "logs"),
            bind_addr,
            max_request_bytes: env_usize("MAX_REQUEST_BYTES", 10 * 1024 * 1024).max(1024),
            enable_cors: env_bool("ENABLE_CORS", true),
            openai_api_key: openai_api_key.trim().to_string(),
            openai_base_url: normalize_base_url(env_string(
                "OPENAI_BASE_URL",
                "https://api.openai.com/v1",
            ))?,
            openai_model: env_string("OPENAI_MODEL", "gpt-4o"),
            openai_temperature: normalize_temperature(env_f32("OPENAI_TEMPERATURE", 0.7)),
            openai_max_tokens: env_u32("OPENAI_MAX_TOKENS", 2048).max(1),
            openai_timeout_seconds: env_u64("OPENAI_TIMEOUT_SECONDS", 60).max(1),
            schema_version: normalize_schema_version(env_string("ANALYSIS_SCHEMA_VERSION", "v2")),
        })
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            model: self.openai_model.clone(),
            temperature: self.openai_temperature,
            max_tokens: self.openai_max_tokens,
            timeout: Duration::from_secs(self.openai_timeout_seconds),
        }
    }
}
