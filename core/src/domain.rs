//! Domain entities and enums shared by every crate in the workspace.

use crate::ids::{EventId, QueueEntryId, ReservationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A role a `User` may hold. Only `Admin` may create events or read stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

/// Persisted account. Authentication is ambient plumbing; the ledger
/// and promotion engine never inspect anything about a `User` beyond its id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// An event as seen by this core: immutable once created. CRUD for events
/// lives outside the concurrency core; this is the shape the ledger and
/// store need to answer "is the sales window open".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub total_seats: u32,
    pub sales_start_at: DateTime<Utc>,
    pub sales_end_at: DateTime<Utc>,
}

impl Event {
    #[must_use]
    pub fn is_sales_open(&self, now: DateTime<Utc>) -> bool {
        self.sales_start_at <= now && now <= self.sales_end_at
    }
}

/// Lifecycle status of a `QueueEntry`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    Waiting,
    Active,
    Done,
    Expired,
}

/// One (event, user) pair's position in the FIFO queue and its resulting
/// reservation, if any. Mutated only by the promotion engine and the
/// expiration pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: QueueEntryId,
    pub event_id: EventId,
    pub user_id: UserId,
    pub status: QueueStatus,
    pub reservation_id: Option<ReservationId>,
    pub join_position: u64,
}

/// Lifecycle status of a `Reservation`. `Canceled` is modeled for API
/// completeness but no code path in this core produces it yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    PendingPayment,
    Paid,
    Expired,
    Canceled,
}

/// A held seat, minted atomically by the promotion engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub event_id: EventId,
    pub user_id: UserId,
    pub status: ReservationStatus,
    pub deadline: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Aggregate reservation counts for admin stats, broken down by terminal
/// (and pending) status.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ReservationCounts {
    pub pending_payment: u64,
    pub paid: u64,
    pub expired: u64,
}
