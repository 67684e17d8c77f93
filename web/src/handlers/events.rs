use axum::extract::{Path, State};
use axum::http::Uri;
use axum::Json;
use ticketq_auth::RequireAdmin;
use ticketq_core::{EventId, Result as CoreResult, TicketingError};
use ticketq_ledger::Ledger;
use ticketq_store::Store;
use uuid::Uuid;

use crate::dto::{event_response, CreateEventRequest, EventResponse, EventStatsResponse};
use crate::error::AppError;
use crate::state::AppState;

pub async fn list_events(State(state): State<AppState>, uri: Uri) -> Result<Json<Vec<EventResponse>>, AppError> {
    list_events_inner(state).await.map_err(|e| AppError::with_path(e, uri.path()))
}

async fn list_events_inner(state: AppState) -> CoreResult<Json<Vec<EventResponse>>> {
    let events = state.store.list_events().await.map_err(map_store)?;
    let mut out = Vec::with_capacity(events.len());
    for event in events {
        let remaining = state.queue.ledger.get_remaining_seats(event.id).await.map_err(map_ledger)?;
        out.push(event_response(event, remaining));
    }
    Ok(Json(out))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    uri: Uri,
) -> Result<Json<EventResponse>, AppError> {
    get_event_inner(state, id).await.map_err(|e| AppError::with_path(e, uri.path()))
}

async fn get_event_inner(state: AppState, id: Uuid) -> CoreResult<Json<EventResponse>> {
    let event_id = EventId::from_uuid(id);
    let event = state
        .store
        .get_event(event_id)
        .await
        .map_err(map_store)?
        .ok_or_else(|| TicketingError::not_found("event", event_id))?;
    let remaining = state.queue.ledger.get_remaining_seats(event_id).await.map_err(map_ledger)?;
    Ok(Json(event_response(event, remaining)))
}

pub async fn create_event(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    uri: Uri,
    Json(req): Json<CreateEventRequest>,
) -> Result<Json<EventResponse>, AppError> {
    create_event_inner(state, req).await.map_err(|e| AppError::with_path(e, uri.path()))
}

async fn create_event_inner(state: AppState, req: CreateEventRequest) -> CoreResult<Json<EventResponse>> {
    if req.sales_end_at <= req.sales_start_at {
        return Err(TicketingError::validation("salesEndAt must be after salesStartAt"));
    }

    let event = state
        .store
        .create_event(&req.name, req.total_seats, req.sales_start_at, req.sales_end_at)
        .await
        .map_err(map_store)?;
    state.queue.ledger.initialize_seats(event.id, req.total_seats).await.map_err(map_ledger)?;

    Ok(Json(event_response(event, req.total_seats)))
}

pub async fn event_stats(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    uri: Uri,
) -> Result<Json<EventStatsResponse>, AppError> {
    event_stats_inner(state, id).await.map_err(|e| AppError::with_path(e, uri.path()))
}

async fn event_stats_inner(state: AppState, id: Uuid) -> CoreResult<Json<EventStatsResponse>> {
    let event_id = EventId::from_uuid(id);
    state
        .store
        .get_event(event_id)
        .await
        .map_err(map_store)?
        .ok_or_else(|| TicketingError::not_found("event", event_id))?;

    let remaining_seats = state.queue.ledger.get_remaining_seats(event_id).await.map_err(map_ledger)?;
    let queue_length = state.queue.ledger.get_queue_length(event_id).await.map_err(map_ledger)?;
    let active_count = state.queue.ledger.get_active_count(event_id).await.map_err(map_ledger)?;
    let reservation_counts = state.store.reservation_counts(event_id).await.map_err(map_store)?;

    Ok(Json(EventStatsResponse {
        event_id: event_id.to_string(),
        remaining_seats,
        queue_length,
        active_count,
        reservation_counts,
    }))
}

fn map_store(e: ticketq_store::StoreError) -> TicketingError {
    match e {
        ticketq_store::StoreError::NotFound => TicketingError::NotFound("event".to_string()),
        ticketq_store::StoreError::Conflict(msg) => TicketingError::Conflict(msg),
        ticketq_store::StoreError::Backend(msg) => TicketingError::Internal(msg),
    }
}

fn map_ledger(e: ticketq_ledger::LedgerError) -> TicketingError {
    TicketingError::Internal(e.to_string())
}
