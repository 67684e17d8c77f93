//! The error taxonomy shared by every crate, so that `web` can map a single
//! type onto HTTP status codes without each layer inventing its own error
//! enum.

use serde::Serialize;
use thiserror::Error;

/// A domain-level failure, classified by HTTP status and a short label.
#[derive(Debug, Error)]
pub enum TicketingError {
    /// 400 — malformed input, out-of-window join, paying a non-pending reservation.
    #[error("{0}")]
    Validation(String),

    /// 401 — missing or invalid credential.
    #[error("{0}")]
    Unauthenticated(String),

    /// 403 — wrong owner, or action attempted without the right queue status.
    #[error("{0}")]
    Forbidden(String),

    /// 404 — unknown event, reservation, or queue entry.
    #[error("{0}")]
    NotFound(String),

    /// 409 — sold-out (decrement went negative).
    #[error("{0}")]
    Conflict(String),

    /// 500 — coordinator, store, or delayed-job backend unavailable.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TicketingError {
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    #[must_use]
    pub fn not_found(resource: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{resource} {id} not found"))
    }

    /// The HTTP status code this error class maps to. Kept here, not in
    /// `web`, so every crate that needs to turn a domain error into a
    /// response (the web crate's handlers, the auth crate's extractors)
    /// maps through the same single taxonomy.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthenticated(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    /// The short error-class label used in the `error` field of the JSON
    /// error body.
    #[must_use]
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Bad Request",
            Self::Unauthenticated(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::NotFound(_) => "Not Found",
            Self::Conflict(_) => "Conflict",
            Self::Internal(_) => "Internal Server Error",
        }
    }

    /// Builds the JSON error envelope both `web` and `auth` render on an
    /// `IntoResponse` impl of their own — this crate has no axum dependency,
    /// so the framework glue stays in those two crates while the shape they
    /// render stays identical.
    #[must_use]
    pub fn to_error_body(&self, path: Option<String>) -> ErrorBody {
        ErrorBody {
            status_code: self.status_code(),
            message: self.to_string(),
            error: self.error_kind(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            path,
        }
    }
}

/// The JSON error envelope returned by every error source in the service —
/// handler failures (`web::AppError`) and extraction failures
/// (`auth::AuthRejection`) alike.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub message: String,
    pub error: &'static str,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

pub type Result<T> = std::result::Result<T, TicketingError>;
