use axum::extract::{Path, State};
use axum::http::Uri;
use axum::Json;
use ticketq_auth::AuthUser;
use ticketq_core::EventId;
use uuid::Uuid;

use crate::dto::QueueStatusResponse;
use crate::error::AppError;
use crate::state::AppState;

pub async fn join(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    uri: Uri,
) -> Result<Json<QueueStatusResponse>, AppError> {
    let view = state
        .queue
        .join(EventId::from_uuid(id), user.user_id)
        .await
        .map_err(|e| AppError::with_path(e, uri.path()))?;
    Ok(Json(view.into()))
}

pub async fn status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    uri: Uri,
) -> Result<Json<QueueStatusResponse>, AppError> {
    let view = state
        .queue
        .status(EventId::from_uuid(id), user.user_id)
        .await
        .map_err(|e| AppError::with_path(e, uri.path()))?;
    Ok(Json(view.into()))
}
