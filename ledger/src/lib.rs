//! # Ticketing Queue Ledger
//!
//! The ledger is the only thing in this workspace allowed to touch the
//! shared coordinator. It owns the seat counter, the FIFO
//! queue's total order, the active-payment-window markers, and the
//! expiration fence. Every cross-process mutual exclusion and ordering
//! guarantee the rest of the system relies on derives from the coordinator's
//! atomicity, not from anything held in this process.

mod memory;
mod redis_ledger;

pub use memory::InMemoryLedger;
pub use redis_ledger::RedisLedger;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use ticketq_core::{EventId, ReservationId, UserId};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("coordinator unavailable: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// The coordinator facade. All callers are in-process; the
/// backing store is shared across processes, so every method here must be
/// safe to call concurrently from many servers at once.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Writes `total` to `seats:E`. Called once per event at creation;
    /// callers must not reinitialize an event already in use.
    async fn initialize_seats(&self, event_id: EventId, total: u32) -> Result<()>;

    /// Atomically subtracts one from `seats:E` and returns the new value.
    /// May return negative; there is no rollback internal to this call.
    async fn decrement_seats(&self, event_id: EventId) -> Result<i64>;

    /// Atomically adds one to `seats:E` and returns the new value.
    async fn increment_seats(&self, event_id: EventId) -> Result<i64>;

    /// Current remaining seats, 0 if the event has no ledger entry.
    async fn get_remaining_seats(&self, event_id: EventId) -> Result<u32>;

    /// Set-if-absent add to the queue. Returns the 1-based rank of the
    /// member by join-order score, whether newly added or already present.
    async fn add_to_queue(&self, event_id: EventId, user_id: UserId) -> Result<u64>;

    /// 1-based rank of `user_id` in the queue, or `None` if absent.
    async fn get_queue_position(&self, event_id: EventId, user_id: UserId) -> Result<Option<u64>>;

    /// Number of members currently queued for `event_id`.
    async fn get_queue_length(&self, event_id: EventId) -> Result<u64>;

    /// The member with the lowest join-order score, without removing it.
    async fn peek_queue_head(&self, event_id: EventId) -> Result<Option<UserId>>;

    /// Removes `user_id` from the queue, if present.
    async fn remove_from_queue(&self, event_id: EventId, user_id: UserId) -> Result<()>;

    /// Marks `user_id` as holding an active payment window for `ttl`, and
    /// bumps `activeCount:E`.
    async fn set_active(&self, event_id: EventId, user_id: UserId, ttl: Duration) -> Result<()>;

    /// Whether `user_id` currently holds an active payment window.
    async fn is_active(&self, event_id: EventId, user_id: UserId) -> Result<bool>;

    /// Clears the active marker for `user_id`, decrementing `activeCount:E`
    /// iff the marker existed.
    async fn clear_active(&self, event_id: EventId, user_id: UserId) -> Result<()>;

    /// Auxiliary count of users currently in their payment window, used for
    /// admission control.
    async fn get_active_count(&self, event_id: EventId) -> Result<u64>;

    /// Set-if-absent fence on `expired:R`. Returns `true` to at most one
    /// caller across the reservation's lifetime; on success the fence is
    /// given its own TTL so it eventually releases storage.
    async fn claim_expiration(&self, reservation_id: ReservationId) -> Result<bool>;
}

/// Fence TTL floor: long enough that a permanently lost reservation's claim
/// eventually releases, short enough not to leak forever.
pub const EXPIRATION_FENCE_TTL: Duration = Duration::from_secs(3600);
