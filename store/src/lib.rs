//! # Ticketing Queue Store
//!
//! The durable mirror: every state transition the ledger authorizes is
//! recorded here afterward, for recovery and reporting.
//! The ledger is never consulted through this crate, and this crate is never
//! consulted to decide whether a seat may be taken — it only ever records
//! what the ledger already decided.

mod error;
mod memory;
mod postgres;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ticketq_core::{
    Event, EventId, QueueEntry, QueueStatus, Reservation, ReservationCounts, ReservationId,
    ReservationStatus, Role, User, UserId,
};

/// Durable mirror of queue entries, reservations, events and users.
/// Every transition method is a conditional-update-by-primary-key and is
/// therefore lock-free and safe to call concurrently.
#[async_trait]
pub trait Store: Send + Sync {
    // -- users / events: conventional plumbing, not part of the core --

    async fn create_user(&self, email: &str, password_hash: &str, name: &str, role: Role) -> Result<User>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Looks up an account together with its stored password hash, for
    /// login. Kept separate from `get_user_by_email` so routes that only
    /// need the profile never pull the hash into scope.
    async fn get_credentials_by_email(&self, email: &str) -> Result<Option<(User, String)>>;

    async fn create_event(
        &self,
        name: &str,
        total_seats: u32,
        sales_start_at: DateTime<Utc>,
        sales_end_at: DateTime<Utc>,
    ) -> Result<Event>;
    async fn get_event(&self, id: EventId) -> Result<Option<Event>>;
    async fn list_events(&self) -> Result<Vec<Event>>;

    // -- queue entries --

    /// Inserts a new WAITING entry. Callers must have already established,
    /// via the ledger, that this is the user's first join for this event.
    async fn insert_waiting_entry(&self, event_id: EventId, user_id: UserId, join_position: u64) -> Result<QueueEntry>;

    async fn get_queue_entry(&self, event_id: EventId, user_id: UserId) -> Result<Option<QueueEntry>>;

    /// Transitions a WAITING entry to ACTIVE with the new reservation id.
    /// Returns `false` (affects no row) if the entry was not WAITING —
    /// the losing side of a concurrent promotion race takes this path.
    async fn activate_queue_entry(
        &self,
        event_id: EventId,
        user_id: UserId,
        reservation_id: ReservationId,
    ) -> Result<bool>;

    async fn mark_queue_entry_done(&self, event_id: EventId, user_id: UserId) -> Result<bool>;
    async fn mark_queue_entry_expired(&self, event_id: EventId, user_id: UserId) -> Result<bool>;

    // -- reservations --

    async fn insert_reservation(
        &self,
        id: ReservationId,
        event_id: EventId,
        user_id: UserId,
        deadline: DateTime<Utc>,
    ) -> Result<Reservation>;

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>>;

    /// Conditional PENDING_PAYMENT → PAID. Returns whether this call won
    /// the race against a concurrent expiration.
    async fn mark_reservation_paid(&self, id: ReservationId, paid_at: DateTime<Utc>) -> Result<bool>;

    /// Conditional PENDING_PAYMENT → EXPIRED. Returns whether this call won
    /// the race against a concurrent payment.
    async fn mark_reservation_expired(&self, id: ReservationId) -> Result<bool>;

    /// PENDING_PAYMENT reservations whose deadline has elapsed, for the
    /// expiration sweep.
    async fn find_elapsed_pending_reservations(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>>;

    async fn reservation_counts(&self, event_id: EventId) -> Result<ReservationCounts>;
}

pub(crate) fn status_to_str(status: QueueStatus) -> &'static str {
    match status {
        QueueStatus::Waiting => "WAITING",
        QueueStatus::Active => "ACTIVE",
        QueueStatus::Done => "DONE",
        QueueStatus::Expired => "EXPIRED",
    }
}

pub(crate) fn status_from_str(s: &str) -> QueueStatus {
    match s {
        "ACTIVE" => QueueStatus::Active,
        "DONE" => QueueStatus::Done,
        "EXPIRED" => QueueStatus::Expired,
        _ => QueueStatus::Waiting,
    }
}

pub(crate) fn reservation_status_to_str(status: ReservationStatus) -> &'static str {
    match status {
        ReservationStatus::PendingPayment => "PENDING_PAYMENT",
        ReservationStatus::Paid => "PAID",
        ReservationStatus::Expired => "EXPIRED",
        ReservationStatus::Canceled => "CANCELED",
    }
}

pub(crate) fn reservation_status_from_str(s: &str) -> ReservationStatus {
    match s {
        "PAID" => ReservationStatus::Paid,
        "EXPIRED" => ReservationStatus::Expired,
        "CANCELED" => ReservationStatus::Canceled,
        _ => ReservationStatus::PendingPayment,
    }
}

pub(crate) fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::Customer => "customer",
        Role::Admin => "admin",
    }
}

pub(crate) fn role_from_str(s: &str) -> Role {
    if s == "admin" {
        Role::Admin
    } else {
        Role::Customer
    }
}
