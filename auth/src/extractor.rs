//! Bearer-token extractors for axum handlers, pulling the caller's identity
//! straight from the JWT rather than a session-store round trip.

use crate::jwt;
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ticketq_core::{Role, TicketingError, UserId};

/// The secret used to sign and verify tokens. Pulled from app state via
/// axum's `FromRef` so every route can share one copy without a global.
#[derive(Clone)]
pub struct JwtSecret(pub String);

/// Wraps a domain error so it can be returned directly as an extraction
/// failure — axum turns a `FromRequestParts::Rejection` straight into the
/// HTTP response, no handler involvement needed. Carries the request path
/// so its `IntoResponse` renders the same envelope shape as `web::AppError`.
#[derive(Debug)]
pub struct AuthRejection {
    error: TicketingError,
    path: String,
}

impl AuthRejection {
    fn new(error: TicketingError, path: &str) -> Self {
        Self { error, path: path.to_string() }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = self.error.to_error_body(Some(self.path));
        (status, Json(body)).into_response()
    }
}

/// An authenticated caller, extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: UserId,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtSecret: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path();
        let secret = JwtSecret::from_ref(state);
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AuthRejection::new(TicketingError::Unauthenticated("missing authorization header".to_string()), path)
            })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            AuthRejection::new(TicketingError::Unauthenticated("expected a bearer token".to_string()), path)
        })?;

        let claims = jwt::verify(&secret.0, token).map_err(|e| AuthRejection::new(e, path))?;
        Ok(Self { user_id: claims.sub, role: claims.role })
    }
}

/// Same as `AuthUser`, additionally requiring the `Admin` role — used for
/// `/admin/events` and `/admin/events/:id/stats`.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    JwtSecret: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_string();
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(AuthRejection::new(TicketingError::Forbidden("admin role required".to_string()), &path));
        }
        Ok(Self(user))
    }
}
