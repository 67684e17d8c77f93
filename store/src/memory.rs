//! In-memory `Store` used alongside `InMemoryLedger` in the `queue` crate's
//! tests, so the promotion/expiration/payment protocols can be exercised end
//! to end without a live Postgres.

use crate::{Result, Store, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use ticketq_core::{
    Event, EventId, QueueEntry, QueueEntryId, QueueStatus, Reservation, ReservationCounts,
    ReservationId, ReservationStatus, Role, User, UserId,
};

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    users_by_email: HashMap<String, UserId>,
    password_hashes: HashMap<UserId, String>,
    events: HashMap<EventId, Event>,
    queue_entries: HashMap<(EventId, UserId), QueueEntry>,
    reservations: HashMap<ReservationId, Reservation>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_user(&self, email: &str, password_hash: &str, name: &str, role: Role) -> Result<User> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.users_by_email.contains_key(email) {
            return Err(StoreError::Conflict(format!("email {email} already registered")));
        }
        let user = User {
            id: UserId::new(),
            email: email.to_string(),
            name: name.to_string(),
            role,
        };
        state.users_by_email.insert(email.to_string(), user.id);
        state.password_hashes.insert(user.id, password_hash.to_string());
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .users_by_email
            .get(email)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.users.get(&id).cloned())
    }

    async fn get_credentials_by_email(&self, email: &str) -> Result<Option<(User, String)>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(user) = state.users_by_email.get(email).and_then(|id| state.users.get(id)).cloned() else {
            return Ok(None);
        };
        let hash = state.password_hashes.get(&user.id).cloned().unwrap_or_default();
        Ok(Some((user, hash)))
    }

    async fn create_event(
        &self,
        name: &str,
        total_seats: u32,
        sales_start_at: DateTime<Utc>,
        sales_end_at: DateTime<Utc>,
    ) -> Result<Event> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let event = Event {
            id: EventId::new(),
            name: name.to_string(),
            total_seats,
            sales_start_at,
            sales_end_at,
        };
        state.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.events.get(&id).cloned())
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut events: Vec<Event> = state.events.values().cloned().collect();
        events.sort_by_key(|e| e.sales_start_at);
        Ok(events)
    }

    async fn insert_waiting_entry(&self, event_id: EventId, user_id: UserId, join_position: u64) -> Result<QueueEntry> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.queue_entries.contains_key(&(event_id, user_id)) {
            return Err(StoreError::Conflict("queue entry already exists".to_string()));
        }
        let entry = QueueEntry {
            id: QueueEntryId::new(),
            event_id,
            user_id,
            status: QueueStatus::Waiting,
            reservation_id: None,
            join_position,
        };
        state.queue_entries.insert((event_id, user_id), entry.clone());
        Ok(entry)
    }

    async fn get_queue_entry(&self, event_id: EventId, user_id: UserId) -> Result<Option<QueueEntry>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.queue_entries.get(&(event_id, user_id)).cloned())
    }

    async fn activate_queue_entry(
        &self,
        event_id: EventId,
        user_id: UserId,
        reservation_id: ReservationId,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = state.queue_entries.get_mut(&(event_id, user_id)) {
            if entry.status == QueueStatus::Waiting {
                entry.status = QueueStatus::Active;
                entry.reservation_id = Some(reservation_id);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn mark_queue_entry_done(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = state.queue_entries.get_mut(&(event_id, user_id)) {
            if entry.status == QueueStatus::Active {
                entry.status = QueueStatus::Done;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn mark_queue_entry_expired(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = state.queue_entries.get_mut(&(event_id, user_id)) {
            if matches!(entry.status, QueueStatus::Waiting | QueueStatus::Active) {
                entry.status = QueueStatus::Expired;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn insert_reservation(
        &self,
        id: ReservationId,
        event_id: EventId,
        user_id: UserId,
        deadline: DateTime<Utc>,
    ) -> Result<Reservation> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let reservation = Reservation {
            id,
            event_id,
            user_id,
            status: ReservationStatus::PendingPayment,
            deadline,
            paid_at: None,
        };
        state.reservations.insert(id, reservation.clone());
        Ok(reservation)
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.reservations.get(&id).cloned())
    }

    async fn mark_reservation_paid(&self, id: ReservationId, paid_at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(r) = state.reservations.get_mut(&id) {
            if r.status == ReservationStatus::PendingPayment {
                r.status = ReservationStatus::Paid;
                r.paid_at = Some(paid_at);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn mark_reservation_expired(&self, id: ReservationId) -> Result<bool> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(r) = state.reservations.get_mut(&id) {
            if r.status == ReservationStatus::PendingPayment {
                r.status = ReservationStatus::Expired;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn find_elapsed_pending_reservations(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .reservations
            .values()
            .filter(|r| r.status == ReservationStatus::PendingPayment && r.deadline <= now)
            .cloned()
            .collect())
    }

    async fn reservation_counts(&self, event_id: EventId) -> Result<ReservationCounts> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut counts = ReservationCounts::default();
        for r in state.reservations.values().filter(|r| r.event_id == event_id) {
            match r.status {
                ReservationStatus::PendingPayment => counts.pending_payment += 1,
                ReservationStatus::Paid => counts.paid += 1,
                ReservationStatus::Expired => counts.expired += 1,
                ReservationStatus::Canceled => {}
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn activate_queue_entry_is_conditional() {
        let store = InMemoryStore::new();
        let event = EventId::new();
        let user = UserId::new();
        store.insert_waiting_entry(event, user, 1).await.unwrap();

        let reservation = ReservationId::new();
        assert!(store.activate_queue_entry(event, user, reservation).await.unwrap());
        // already ACTIVE: second call loses the race
        assert!(!store.activate_queue_entry(event, user, ReservationId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn payment_and_expiration_are_mutually_exclusive() {
        let store = InMemoryStore::new();
        let reservation_id = ReservationId::new();
        store
            .insert_reservation(reservation_id, EventId::new(), UserId::new(), Utc::now() + Duration::minutes(5))
            .await
            .unwrap();

        assert!(store.mark_reservation_paid(reservation_id, Utc::now()).await.unwrap());
        assert!(!store.mark_reservation_expired(reservation_id).await.unwrap());
    }
}
