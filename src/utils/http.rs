use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

/// Builds the process-wide client; `main` creates it once and hands it to the gateway.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")
}
