//! Maps a domain error onto the JSON error body every handler returns.
//!
//! `TicketingError` carries its own status code, error-kind label and
//! envelope builder (`core::error`); this type only adds the thing that's
//! specific to the HTTP layer — the request path — and implements the
//! foreign `IntoResponse` trait, which the orphan rule won't let `core`
//! do for `TicketingError` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ticketq_core::TicketingError;

#[derive(Debug)]
pub struct AppError {
    inner: TicketingError,
    path: Option<String>,
}

impl AppError {
    #[must_use]
    pub fn with_path(inner: TicketingError, path: impl Into<String>) -> Self {
        Self { inner, path: Some(path.into()) }
    }
}

impl From<TicketingError> for AppError {
    fn from(inner: TicketingError) -> Self {
        Self { inner, path: None }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.inner, path = ?self.path, "request failed");
        }
        let body = self.inner.to_error_body(self.path);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError::from(TicketingError::not_found("event", "abc"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn with_path_carries_the_request_path_into_the_body() {
        let err = AppError::with_path(TicketingError::not_found("event", "abc"), "/events/abc");
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["path"], "/events/abc");
    }
}
