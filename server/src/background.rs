//! Periodic tasks driving the promotion engine and the expiration sweep.
//! Each event with an open sales window gets a promotion attempt every tick;
//! the sweep runs once per tick across all events regardless of window.

use std::time::Duration;
use ticketq_core::Clock;
use ticketq_ledger::RedisLedger;
use ticketq_notify::Hub;
use ticketq_store::{PostgresStore, Store};
use tracing::{error, info};

type Queue = ticketq_queue::QueueSystem<RedisLedger, PostgresStore, Hub, ticketq_core::SystemClock>;

pub fn spawn_promotion_loop(queue: Queue, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let events = match queue.store.list_events().await {
                Ok(events) => events,
                Err(e) => {
                    error!(error = %e, "promotion loop failed to list events");
                    continue;
                }
            };
            for event in events {
                if !event.is_sales_open(queue.clock.now()) {
                    continue;
                }
                if let Err(e) = queue.promote_batch(event.id).await {
                    error!(event_id = %event.id, error = %e, "promotion batch failed");
                }
            }
        }
    })
}

pub fn spawn_expiration_sweep_loop(queue: Queue, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match queue.sweep_expired_reservations().await {
                Ok(processed) if processed > 0 => info!(processed, "expiration sweep processed reservations"),
                Ok(_) => {}
                Err(e) => error!(error = %e, "expiration sweep failed"),
            }
        }
    })
}
