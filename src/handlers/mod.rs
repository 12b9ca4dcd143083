pub mod analyze;
pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
pub struct RouterSettings {
    pub max_request_bytes: usize,
    pub enable_cors: bool,
}

pub fn build_router(state: AppState, settings: RouterSettings) -> Router {
    let router = Router::new()
        .route("/analyzeChat", post(analyze::analyze_chat))
        .route("/v1/analyze", post(analyze::analyze_chat))
        .route("/health", get(health::health))
        .layer(DefaultBodyLimit::max(settings.max_request_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if settings.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use base64::{engine::general_purpose, Engine as _};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::analysis::{RequestHandler, SchemaVersion};
    use crate::llm::gateway::{ModelGateway, ModelReply, ModelRequest, UpstreamError};

    struct FixedGateway {
        content: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelGateway for FixedGateway {
        fn provider(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed-model"
        }

        async fn complete(&self, _request: &ModelRequest) -> Result<ModelReply, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ModelReply {
                content: self.content.clone(),
                usage: None,
                duration: Duration::from_millis(1),
            })
        }
    }

    fn app(content: &str) -> (Router, Arc<FixedGateway>) {
        let gateway = Arc::new(FixedGateway {
            content: content.to_string(),
            calls: AtomicUsize::new(0),
        });
        let handler = RequestHandler::new(gateway.clone(), SchemaVersion::V2);
        let router = build_router(
            AppState::new(handler),
            RouterSettings {
                max_request_bytes: 64 * 1024,
                enable_cors: false,
            },
        );
        (router, gateway)
    }

    fn png_base64() -> String {
        general_purpose::STANDARD.encode([0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00])
    }

    async fn post_json(router: Router, path: &str, body: String) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn success_wraps_data() {
        let (router, gateway) = app(r#"{"totalScore": 6, "summary": "還不錯"}"#);
        let body = json!({ "imageBase64": png_base64(), "language": "zh-TW" }).to_string();
        let (status, value) = post_json(router, "/analyzeChat", body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["data"]["totalScore"], json!(6));
        assert_eq!(value["data"]["radar"]["defense"]["score"], json!(0));
        assert!(value["data"]["sentences"].is_array());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn callable_envelope_is_accepted() {
        let (router, _) = app(r#"{"totalScore": 3}"#);
        let body = json!({ "data": { "imageBase64": png_base64() } }).to_string();
        let (status, value) = post_json(router, "/v1/analyze", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["data"]["totalScore"], json!(3));
    }

    #[tokio::test]
    async fn missing_image_is_bad_request() {
        let (router, gateway) = app("{}");
        let (status, value) = post_json(router, "/analyzeChat", json!({}).to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"]["code"], json!("invalid-argument"));
        assert_eq!(value["error"]["details"]["field"], json!("imageBase64"));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let (router, gateway) = app("{}");
        let (status, value) = post_json(router, "/analyzeChat", "not json".to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"]["code"], json!("invalid-argument"));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn model_prose_is_internal_error() {
        let (router, _) = app("I can't help with that.");
        let body = json!({ "imageBase64": png_base64() }).to_string();
        let (status, value) = post_json(router, "/analyzeChat", body).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"]["code"], json!("internal"));
        assert!(value["error"].get("details").is_none());
        assert!(!value.to_string().contains("I can't help"));
    }

    #[tokio::test]
    async fn health_reports_schema_version() {
        let (router, _) = app("{}");
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({ "status": "ok", "schemaVersion": "v2" }));
    }
}
