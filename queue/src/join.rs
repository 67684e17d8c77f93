//! Queue-join protocol and the `queue/me` status read.

use crate::{map_ledger_err, map_store_err, QueueSystem};
use chrono::{DateTime, Utc};
use ticketq_core::{Clock, EventId, QueueStatus, Result, ReservationId, TicketingError, UserId};
use ticketq_ledger::Ledger;
use ticketq_notify::Notifier;
use ticketq_store::Store;
use tracing::info;

/// Response shape for both queue-join and queue-status reads — the two
/// bodies share enough fields to reuse one type.
#[derive(Clone, Debug)]
pub struct QueueStatusView {
    pub event_id: EventId,
    pub position: Option<u64>,
    pub status: QueueStatus,
    pub reservation_id: Option<ReservationId>,
    pub expires_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

impl<L, S, N, C> QueueSystem<L, S, N, C>
where
    L: Ledger,
    S: Store,
    N: Notifier,
    C: Clock,
{
    /// Joins `user_id` to `event_id`'s queue, or returns the existing entry
    /// unchanged if one already exists (idempotent on retry).
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the event is unknown or outside its sales
    /// window, or `Internal` on a ledger/store failure.
    pub async fn join(&self, event_id: EventId, user_id: UserId) -> Result<QueueStatusView> {
        let event = self
            .store
            .get_event(event_id)
            .await
            .map_err(map_store_err)?
            .ok_or_else(|| TicketingError::not_found("event", event_id))?;

        let now = self.clock.now();
        if !event.is_sales_open(now) {
            let reason = if now < event.sales_start_at {
                "sales have not started"
            } else {
                "sales have ended"
            };
            return Err(TicketingError::validation(reason));
        }

        if let Some(entry) = self
            .store
            .get_queue_entry(event_id, user_id)
            .await
            .map_err(map_store_err)?
        {
            let position = self
                .ledger
                .get_queue_position(event_id, user_id)
                .await
                .map_err(map_ledger_err)?;
            return Ok(QueueStatusView {
                event_id,
                position,
                status: entry.status,
                reservation_id: entry.reservation_id,
                expires_at: None,
                message: Some("already in queue".to_string()),
            });
        }

        let position = self
            .ledger
            .add_to_queue(event_id, user_id)
            .await
            .map_err(map_ledger_err)?;
        self.store
            .insert_waiting_entry(event_id, user_id, position)
            .await
            .map_err(map_store_err)?;

        info!(%event_id, %user_id, position, "queue join accepted");

        Ok(QueueStatusView {
            event_id,
            position: Some(position),
            status: QueueStatus::Waiting,
            reservation_id: None,
            expires_at: None,
            message: Some("joined queue".to_string()),
        })
    }

    /// Reads a user's current queue status without mutating anything —
    /// the authoritative view clients are expected to poll.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user has never joined this event's queue.
    pub async fn status(&self, event_id: EventId, user_id: UserId) -> Result<QueueStatusView> {
        let entry = self
            .store
            .get_queue_entry(event_id, user_id)
            .await
            .map_err(map_store_err)?
            .ok_or_else(|| TicketingError::not_found("queue entry for user", user_id))?;

        let position = match entry.status {
            QueueStatus::Waiting => self
                .ledger
                .get_queue_position(event_id, user_id)
                .await
                .map_err(map_ledger_err)?,
            _ => None,
        };

        let expires_at = if let Some(reservation_id) = entry.reservation_id {
            self.store
                .get_reservation(reservation_id)
                .await
                .map_err(map_store_err)?
                .map(|r| r.deadline)
        } else {
            None
        };

        Ok(QueueStatusView {
            event_id,
            position,
            status: entry.status,
            reservation_id: entry.reservation_id,
            expires_at,
            message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueueConfig;
    use chrono::Duration;
    use std::sync::Arc;
    use ticketq_core::SystemClock;
    use ticketq_ledger::InMemoryLedger;
    use ticketq_notify::NullNotifier;
    use ticketq_store::InMemoryStore;

    async fn system() -> (QueueSystem<InMemoryLedger, InMemoryStore, NullNotifier, SystemClock>, EventId) {
        let ledger = Arc::new(InMemoryLedger::new());
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(NullNotifier);
        let clock = Arc::new(SystemClock);

        let event = store
            .create_event("Test Event", 10, Utc::now() - Duration::minutes(1), Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        ledger.initialize_seats(event.id, 10).await.unwrap();

        (QueueSystem::new(ledger, store, notifier, clock, QueueConfig::default()), event.id)
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let (system, event_id) = system().await;
        let user = UserId::new();

        let first = system.join(event_id, user).await.unwrap();
        assert_eq!(first.position, Some(1));
        assert_eq!(first.status, QueueStatus::Waiting);

        for _ in 0..9 {
            let again = system.join(event_id, user).await.unwrap();
            assert_eq!(again.position, Some(1));
        }

        assert_eq!(system.ledger.get_queue_length(event_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn join_outside_sales_window_is_rejected() {
        let ledger = Arc::new(InMemoryLedger::new());
        let store = Arc::new(InMemoryStore::new());
        let event = store
            .create_event("Future Event", 10, Utc::now() + Duration::hours(1), Utc::now() + Duration::hours(2))
            .await
            .unwrap();
        let system = QueueSystem::new(ledger, store, Arc::new(NullNotifier), Arc::new(SystemClock), QueueConfig::default());

        let err = system.join(event.id, UserId::new()).await.unwrap_err();
        assert!(matches!(err, TicketingError::Validation(_)));
    }
}
