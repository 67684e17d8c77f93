use axum::extract::FromRef;
use std::sync::Arc;
use ticketq_auth::JwtSecret;
use ticketq_core::SystemClock;
use ticketq_ledger::RedisLedger;
use ticketq_notify::Hub;
use ticketq_store::PostgresStore;

/// The production instantiation of the generic queue system: Redis for the
/// coordinator, Postgres for the durable mirror, an in-process fan-out hub
/// for pushes, and the wall clock.
pub type Queue = ticketq_queue::QueueSystem<RedisLedger, PostgresStore, Hub, SystemClock>;

#[derive(Clone)]
pub struct AppState {
    pub queue: Queue,
    pub store: Arc<PostgresStore>,
    pub hub: Arc<Hub>,
    pub jwt_secret: JwtSecret,
    pub jwt_ttl: chrono::Duration,
}

impl FromRef<AppState> for JwtSecret {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_secret.clone()
    }
}
