use axum::extract::{Path, State};
use axum::http::Uri;
use axum::Json;
use ticketq_auth::AuthUser;
use ticketq_core::ReservationId;
use uuid::Uuid;

use crate::dto::ReservationResponse;
use crate::error::AppError;
use crate::state::AppState;

pub async fn pay(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    uri: Uri,
) -> Result<Json<ReservationResponse>, AppError> {
    let reservation = state
        .queue
        .pay(ReservationId::from_uuid(id), user.user_id)
        .await
        .map_err(|e| AppError::with_path(e, uri.path()))?;
    Ok(Json(reservation.into()))
}
