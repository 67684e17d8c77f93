use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, events, queue, reservations};
use crate::state::AppState;
use crate::websocket;

pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/events", get(events::list_events))
        .route("/events/:id", get(events::get_event))
        .route("/admin/events", post(events::create_event))
        .route("/admin/events/:id/stats", get(events::event_stats))
        .route("/events/:id/queue/join", post(queue::join))
        .route("/events/:id/queue/me", get(queue::status))
        .route("/reservations/:id/pay", post(reservations::pay))
        .route("/ws", get(websocket::upgrade))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
