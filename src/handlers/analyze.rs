use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use crate::analysis::{ErrorCode, ErrorEnvelope, RequestBody};
use crate::state::AppState;

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub struct ApiError {
    status: StatusCode,
    envelope: ErrorEnvelope,
}

impl From<ErrorEnvelope> for ApiError {
    fn from(envelope: ErrorEnvelope) -> Self {
        ApiError {
            status: status_for(envelope.code),
            envelope,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected request body: {}", rejection.body_text());
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError {
            status,
            envelope: ErrorEnvelope::invalid_argument(
                "Request body must be a JSON object with an imageBase64 field.",
                Some(json!({ "reason": rejection.body_text() })),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.envelope }))).into_response()
    }
}

pub async fn analyze_chat(
    State(state): State<AppState>,
    body: Result<Json<RequestBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let result = state.handler.handle(body.into_request()).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "data": result })),
    )
        .into_response())
}
