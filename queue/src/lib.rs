//! # Ticketing Queue — concurrency core
//!
//! Implements the queue-join, promotion, expiration and payment protocols on
//! top of the `ledger` (coordinator facade) and `store` (durable mirror)
//! crates. Nothing in this crate talks to Redis or Postgres directly — it
//! only ever calls through the `Ledger` and `Store` traits, so the property
//! and scenario tests below run entirely against the in-memory fakes.

pub mod expiration;
pub mod join;
pub mod payment;
pub mod promotion;

use std::sync::Arc;
use std::time::Duration;
use ticketq_core::TicketingError;
use ticketq_ledger::{Ledger, LedgerError};
use ticketq_notify::Notifier;
use ticketq_store::{Store, StoreError};

pub use join::QueueStatusView;
pub use promotion::PromotionOutcome;

/// Tunables threaded through every protocol. Defaults mirror the fixed
/// reservation window and the admission cap.
#[derive(Clone, Copy, Debug)]
pub struct QueueConfig {
    /// The payment window granted on promotion.
    pub reservation_window: Duration,
    /// The admission cap on concurrently active payment windows.
    pub max_concurrent_active: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            reservation_window: Duration::from_secs(300),
            max_concurrent_active: 500,
        }
    }
}

/// The four collaborators every protocol needs, bundled once per process and
/// shared by cheap `Arc` clones (axum handlers and background tasks each
/// hold their own `QueueSystem` clone).
pub struct QueueSystem<L, S, N, C> {
    pub ledger: Arc<L>,
    pub store: Arc<S>,
    pub notifier: Arc<N>,
    pub clock: Arc<C>,
    pub config: QueueConfig,
}

impl<L, S, N, C> Clone for QueueSystem<L, S, N, C> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            clock: Arc::clone(&self.clock),
            config: self.config,
        }
    }
}

impl<L, S, N, C> QueueSystem<L, S, N, C>
where
    L: Ledger,
    S: Store,
    N: Notifier,
    C: ticketq_core::Clock,
{
    pub fn new(ledger: Arc<L>, store: Arc<S>, notifier: Arc<N>, clock: Arc<C>, config: QueueConfig) -> Self {
        Self {
            ledger,
            store,
            notifier,
            clock,
            config,
        }
    }
}

fn map_ledger_err(e: LedgerError) -> TicketingError {
    TicketingError::Internal(e.to_string())
}

fn map_store_err(e: StoreError) -> TicketingError {
    match e {
        StoreError::NotFound => TicketingError::NotFound("resource".to_string()),
        StoreError::Conflict(msg) => TicketingError::Conflict(msg),
        StoreError::Backend(msg) => TicketingError::Internal(msg),
    }
}
