//! `GET /ws` — a push channel streaming a user's `Notification`s.
//!
//! Browsers cannot set an `Authorization` header on the upgrade request, so
//! the bearer token travels as a `token` query parameter instead and is
//! verified the same way the bearer extractor verifies it everywhere else.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::state::AppState;

static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

const MAX_CONNECTIONS: usize = 1000;
const PING_INTERVAL_SECS: u64 = 30;
const IDLE_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Deserialize)]
pub struct WsAuth {
    token: String,
}

pub async fn upgrade(
    State(state): State<AppState>,
    Query(auth): Query<WsAuth>,
    ws: WebSocketUpgrade,
) -> Response {
    let current = ACTIVE_CONNECTIONS.load(Ordering::Relaxed);
    if current >= MAX_CONNECTIONS {
        warn!(current_connections = current, "websocket connection limit exceeded");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many concurrent connections").into_response();
    }

    let claims = match ticketq_auth::jwt::verify(&state.jwt_secret.0, &auth.token) {
        Ok(claims) => claims,
        Err(e) => return (StatusCode::UNAUTHORIZED, e.to_string()).into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, claims.sub, state))
}

async fn handle_socket(socket: WebSocket, user_id: ticketq_core::UserId, state: AppState) {
    let count = ACTIVE_CONNECTIONS.fetch_add(1, Ordering::Relaxed) + 1;
    info!(%user_id, total_connections = count, "websocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (channel_sender, mut notifications) = state.hub.register(user_id);

    let mut push_task = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            let Ok(json) = serde_json::to_string(&notification) else { continue };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        let mut ping_interval = interval(Duration::from_secs(PING_INTERVAL_SECS));
        loop {
            let idle = tokio::time::sleep(Duration::from_secs(IDLE_TIMEOUT_SECS));
            tokio::pin!(idle);
            tokio::select! {
                _ = ping_interval.tick() => {}
                frame = receiver.next() => {
                    match frame {
                        Some(Ok(Message::Close(_))) | None => {
                            info!("client closed websocket");
                            break;
                        }
                        Some(Err(_)) => break,
                        _ => {}
                    }
                }
                () = &mut idle => {
                    warn!("websocket idle timeout");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut push_task => { recv_task.abort(); }
        _ = &mut recv_task => { push_task.abort(); }
    }

    state.hub.unregister(user_id, &channel_sender);
    let remaining = ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::Relaxed) - 1;
    debug!(%user_id, total_connections = remaining, "websocket connection closed");
}
