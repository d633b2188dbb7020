use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// JSON error body returned by every route: `{"error": ...}` plus an optional
/// `detail` that is only sent for client errors.
#[derive(Debug, Error)]
#[error("{status}: {error}")]
pub struct JsonApiError {
    pub status: StatusCode,
    pub error: String,
    pub detail: Option<String>,
}

#[derive(Serialize)]
struct Body<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
}

impl JsonApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, detail: Option<String>) -> Self {
        Self { status, error: error.into(), detail }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, None)
    }

    pub fn unauthorized(error: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error, None)
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error, None)
    }

    /// Generic 500; the cause is logged, not returned.
    pub fn internal(error: impl Into<String>, cause: &dyn std::fmt::Display) -> Self {
        let error = error.into();
        error!(error = %error, cause = %cause, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error, None)
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        let detail = if self.status.is_client_error() { self.detail.as_deref() } else { None };
        let body = Body { error: &self.error, detail };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("runtime check failed: {0}")]
    Runtime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn client_error_carries_detail() {
        let resp = JsonApiError::new(StatusCode::BAD_REQUEST, "Invalid entry IDs", Some("not an array".into()))
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = body_json(resp).await;
        assert_eq!(v["error"], "Invalid entry IDs");
        assert_eq!(v["detail"], "not an array");
    }

    #[tokio::test]
    async fn server_error_hides_detail() {
        let resp = JsonApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete entry", Some("db down".into()))
            .into_response();
        let v = body_json(resp).await;
        assert_eq!(v, serde_json::json!({"error": "Failed to delete entry"}));
    }
}
