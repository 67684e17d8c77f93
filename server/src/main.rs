//! Ticketing queue HTTP server.

mod background;
mod config;

use config::Config;
use std::sync::Arc;
use std::time::Duration;
use ticketq_auth::JwtSecret;
use ticketq_core::SystemClock;
use ticketq_ledger::RedisLedger;
use ticketq_notify::Hub;
use ticketq_queue::QueueConfig;
use ticketq_store::PostgresStore;
use ticketq_web::state::AppState;
use tokio::signal;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticketq=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(addr = %config.bind_addr(), "starting ticketq server");

    let store = Arc::new(PostgresStore::connect(&config.database_url, config.database_max_connections).await?);
    store.migrate().await?;

    let ledger = Arc::new(RedisLedger::connect(&config.redis_url).await?);
    let hub = Arc::new(Hub::new());
    let clock = Arc::new(SystemClock);

    let queue_config = QueueConfig {
        reservation_window: Duration::from_secs(config.reservation_window_secs),
        max_concurrent_active: config.max_concurrent_active,
    };
    let queue = ticketq_queue::QueueSystem::new(
        Arc::clone(&ledger),
        Arc::clone(&store),
        Arc::clone(&hub),
        Arc::clone(&clock),
        queue_config,
    );

    let promotion_task =
        background::spawn_promotion_loop(queue.clone(), Duration::from_secs(config.promotion_interval_secs));
    let sweep_task = background::spawn_expiration_sweep_loop(
        queue.clone(),
        Duration::from_secs(config.expiration_sweep_interval_secs),
    );

    let state = AppState {
        queue,
        store,
        hub,
        jwt_secret: JwtSecret(config.jwt_secret.clone()),
        jwt_ttl: chrono::Duration::seconds(config.jwt_ttl_secs),
    };

    let app = ticketq_web::build(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;

    info!("listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    promotion_task.abort();
    sweep_task.abort();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, shutting down gracefully"),
        () = terminate => info!("received sigterm, shutting down gracefully"),
    }
}
