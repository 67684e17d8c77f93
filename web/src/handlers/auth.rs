use axum::extract::State;
use axum::http::Uri;
use axum::Json;
use ticketq_core::{Result as CoreResult, Role, TicketingError};
use ticketq_store::Store;

use crate::dto::{AuthResponse, LoginRequest, RegisterRequest, UserResponse};
use crate::error::AppError;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    uri: Uri,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, AppError> {
    register_inner(state, req).await.map_err(|e| AppError::with_path(e, uri.path()))
}

async fn register_inner(state: AppState, req: RegisterRequest) -> CoreResult<Json<UserResponse>> {
    if state.store.get_user_by_email(&req.email).await.map_err(map_store)?.is_some() {
        return Err(TicketingError::Conflict("an account with that email already exists".to_string()));
    }

    let password_hash = ticketq_auth::hash_password(&req.password)?;
    let user = state
        .store
        .create_user(&req.email, &password_hash, &req.name, Role::Customer)
        .await
        .map_err(map_store)?;

    Ok(Json(user.into()))
}

pub async fn login(
    State(state): State<AppState>,
    uri: Uri,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    login_inner(state, req).await.map_err(|e| AppError::with_path(e, uri.path()))
}

async fn login_inner(state: AppState, req: LoginRequest) -> CoreResult<Json<AuthResponse>> {
    let (user, hash) = state
        .store
        .get_credentials_by_email(&req.email)
        .await
        .map_err(map_store)?
        .ok_or_else(|| TicketingError::Unauthenticated("invalid email or password".to_string()))?;

    if !ticketq_auth::verify_password(&req.password, &hash) {
        return Err(TicketingError::Unauthenticated("invalid email or password".to_string()));
    }

    let access_token = ticketq_auth::jwt::issue(&state.jwt_secret.0, user.id, user.role, state.jwt_ttl)?;

    Ok(Json(AuthResponse { access_token, user: user.into() }))
}

fn map_store(e: ticketq_store::StoreError) -> TicketingError {
    match e {
        ticketq_store::StoreError::NotFound => TicketingError::NotFound("user".to_string()),
        ticketq_store::StoreError::Conflict(msg) => TicketingError::Conflict(msg),
        ticketq_store::StoreError::Backend(msg) => TicketingError::Internal(msg),
    }
}
