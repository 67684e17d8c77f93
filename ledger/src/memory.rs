//! In-memory `Ledger` used by `queue`'s unit and property tests so the
//! concurrency core's invariants can be exercised without a live Redis.
//!
//! Ordering and atomicity are preserved: a single `Mutex` stands in for the
//! coordinator's single-writer guarantees, which is exactly the property the
//! tests need (linearizable decrement/increment, deterministic queue rank).

use crate::{Ledger, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use ticketq_core::{EventId, ReservationId, UserId};

#[derive(Default)]
struct State {
    seats: HashMap<EventId, i64>,
    queue: HashMap<EventId, Vec<(u64, UserId)>>,
    seq: HashMap<EventId, u64>,
    active: HashMap<(EventId, UserId), DateTime<Utc>>,
    active_count: HashMap<EventId, i64>,
    expired_fence: HashSet<ReservationId>,
}

#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The expiry recorded by the most recent `set_active` call for
    /// `(event_id, user_id)`, so tests can assert it matches the
    /// reservation's deadline. `None` if no active marker is set.
    #[must_use]
    pub fn active_expiry(&self, event_id: EventId, user_id: UserId) -> Option<DateTime<Utc>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.active.get(&(event_id, user_id)).copied()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn initialize_seats(&self, event_id: EventId, total: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.seats.insert(event_id, i64::from(total));
        Ok(())
    }

    async fn decrement_seats(&self, event_id: EventId) -> Result<i64> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let v = state.seats.entry(event_id).or_insert(0);
        *v -= 1;
        Ok(*v)
    }

    async fn increment_seats(&self, event_id: EventId) -> Result<i64> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let v = state.seats.entry(event_id).or_insert(0);
        *v += 1;
        Ok(*v)
    }

    async fn get_remaining_seats(&self, event_id: EventId) -> Result<u32> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.seats.get(&event_id).copied().unwrap_or(0).max(0) as u32)
    }

    async fn add_to_queue(&self, event_id: EventId, user_id: UserId) -> Result<u64> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let list = state.queue.entry(event_id).or_default();
        if let Some(pos) = list.iter().position(|(_, u)| *u == user_id) {
            return Ok((pos + 1) as u64);
        }
        let seq = state.seq.entry(event_id).or_insert(0);
        *seq += 1;
        let next_seq = *seq;
        let list = state.queue.entry(event_id).or_default();
        list.push((next_seq, user_id));
        Ok(list.len() as u64)
    }

    async fn get_queue_position(&self, event_id: EventId, user_id: UserId) -> Result<Option<u64>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .queue
            .get(&event_id)
            .and_then(|list| list.iter().position(|(_, u)| *u == user_id))
            .map(|p| (p + 1) as u64))
    }

    async fn get_queue_length(&self, event_id: EventId) -> Result<u64> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.queue.get(&event_id).map_or(0, |l| l.len() as u64))
    }

    async fn peek_queue_head(&self, event_id: EventId) -> Result<Option<UserId>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.queue.get(&event_id).and_then(|l| l.first()).map(|(_, u)| *u))
    }

    async fn remove_from_queue(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = state.queue.get_mut(&event_id) {
            list.retain(|(_, u)| *u != user_id);
        }
        Ok(())
    }

    async fn set_active(&self, event_id: EventId, user_id: UserId, ttl: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let expiry = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        state.active.insert((event_id, user_id), expiry);
        *state.active_count.entry(event_id).or_insert(0) += 1;
        Ok(())
    }

    async fn is_active(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.active.contains_key(&(event_id, user_id)))
    }

    async fn clear_active(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.active.remove(&(event_id, user_id)).is_some() {
            *state.active_count.entry(event_id).or_insert(0) -= 1;
        }
        Ok(())
    }

    async fn get_active_count(&self, event_id: EventId) -> Result<u64> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.active_count.get(&event_id).copied().unwrap_or(0).max(0) as u64)
    }

    async fn claim_expiration(&self, reservation_id: ReservationId) -> Result<bool> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.expired_fence.insert(reservation_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_to_queue_is_idempotent_and_fifo() {
        let ledger = InMemoryLedger::new();
        let event = EventId::new();
        let a = UserId::new();
        let b = UserId::new();

        assert_eq!(ledger.add_to_queue(event, a).await.unwrap(), 1);
        assert_eq!(ledger.add_to_queue(event, b).await.unwrap(), 2);
        // repeated join does not move the member
        assert_eq!(ledger.add_to_queue(event, a).await.unwrap(), 1);
        assert_eq!(ledger.get_queue_length(event).await.unwrap(), 2);
        assert_eq!(ledger.peek_queue_head(event).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn claim_expiration_succeeds_exactly_once() {
        let ledger = InMemoryLedger::new();
        let reservation = ReservationId::new();
        assert!(ledger.claim_expiration(reservation).await.unwrap());
        assert!(!ledger.claim_expiration(reservation).await.unwrap());
    }

    #[tokio::test]
    async fn clear_active_decrements_count_once() {
        let ledger = InMemoryLedger::new();
        let event = EventId::new();
        let user = UserId::new();
        ledger.set_active(event, user, Duration::from_secs(1)).await.unwrap();
        assert_eq!(ledger.get_active_count(event).await.unwrap(), 1);
        ledger.clear_active(event, user).await.unwrap();
        ledger.clear_active(event, user).await.unwrap();
        assert_eq!(ledger.get_active_count(event).await.unwrap(), 0);
    }
}
