use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

pub const TIMING_TARGET: &str = "service.timing";

#[derive(Debug)]
pub struct RequestTimer {
    operation: String,
    request_id: u64,
    language: String,
    image_chars: usize,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

impl RequestTimer {
    pub fn new(operation: &str, request_id: u64, language: &str, image_chars: usize) -> Self {
        RequestTimer {
            operation: operation.to_string(),
            request_id,
            language: language.to_string(),
            image_chars,
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        }
    }

    pub fn log_received(&self) {
        info!(
            target: TIMING_TARGET,
            "event=request_received operation={} request_id={} language={} image_chars={} received_at={}",
            self.operation,
            self.request_id,
            self.language,
            self.image_chars,
            self.started_at.to_rfc3339()
        );
    }

    pub fn mark_status(&mut self, status: &str, detail: Option<String>) {
        self.status = status.to_string();
        self.detail = detail;
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=request_completed operation={} request_id={} started_at={} completed_at={} duration_s={:.3} status={} detail={}",
            self.operation,
            self.request_id,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            self.status,
            self.detail.clone().unwrap_or_default()
        );
    }
}

pub fn start_request_timer(
    operation: &str,
    request_id: u64,
    language: &str,
    image_chars: usize,
) -> RequestTimer {
    let timer = RequestTimer::new(operation, request_id, language, image_chars);
    timer.log_received();
    timer
}

pub fn complete_request_timer(timer: &mut RequestTimer, status: &str, detail: Option<String>) {
    timer.mark_status(status, detail);
    timer.log_completed();
}

pub async fn log_llm_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: TIMING_TARGET,
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = match &result {
        Ok(_) => "success".to_string(),
        Err(err) => format!("error ({err})"),
    };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: TIMING_TARGET,
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn llm_timing_passes_result_through() {
        let ok: Result<u8, String> =
            log_llm_timing("test", "model", "op", None, || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u8, String> = log_llm_timing("test", "model", "op", None, || async {
            Err("boom".to_string())
        })
        .await;
        assert_eq!(err, Err("boom".to_string()));
    }

    #[test]
    fn completion_is_logged_once() {
        let mut timer = RequestTimer::new("analyze", 1, "zh-TW", 10);
        complete_request_timer(&mut timer, "error", Some("input".to_string()));
        assert!(timer.completed);
        timer.mark_status("success", None);
        timer.log_completed();
        assert_eq!(timer.status, "success");
    }
}
