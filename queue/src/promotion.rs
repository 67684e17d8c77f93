//! Promotion engine — the decrement-first protocol that turns
//! a queue head into a held reservation without ever overselling.

use crate::{map_ledger_err, map_store_err, QueueSystem};
use ticketq_core::{Clock, EventId, Result, ReservationId, UserId};
use ticketq_ledger::Ledger;
use ticketq_notify::{Notification, Notifier};
use ticketq_store::Store;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of a single promotion attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromotionOutcome {
    Promoted { user_id: UserId, reservation_id: ReservationId },
    SoldOut { user_id: UserId },
    Empty,
    /// The admission cap (`activeCount:E` vs `max_concurrent_active`) left no
    /// slots; `promote_batch` stops without consulting the ledger further.
    Throttled,
}

impl<L, S, N, C> QueueSystem<L, S, N, C>
where
    L: Ledger,
    S: Store,
    N: Notifier,
    C: Clock,
{
    /// Runs the decrement-first promotion protocol once.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the ledger or store is unreachable. A lost race
    /// against another promoter (store reports zero rows affected) is not an
    /// error — it is the documented, benign loser path.
    pub async fn promote_one(&self, event_id: EventId) -> Result<PromotionOutcome> {
        loop {
            let Some(user_id) = self.ledger.peek_queue_head(event_id).await.map_err(map_ledger_err)? else {
                return Ok(PromotionOutcome::Empty);
            };

            let remaining = self.ledger.decrement_seats(event_id).await.map_err(map_ledger_err)?;

            if remaining >= 0 {
                // `admit` returns `None` when it lost the activation race
                // against a concurrent promoter that already claimed this
                // same head; the head has since been removed by the winner,
                // so retrying finds the next waiter instead of returning a
                // misleading outcome.
                if let Some(outcome) = self.admit(event_id, user_id).await? {
                    return Ok(outcome);
                }
            } else {
                return self.reject_sold_out(event_id, user_id).await;
            }
        }
    }

    /// Runs `promote_one` until the queue is empty, a sold-out decision is
    /// reached, or `max_concurrent_active` slots are exhausted.
    ///
    /// # Errors
    ///
    /// Propagates any error from `promote_one`; outcomes already collected
    /// before the failing call are discarded, matching the "no partial
    /// commit visible to the caller" framing of a single batch invocation.
    pub async fn promote_batch(&self, event_id: EventId) -> Result<Vec<PromotionOutcome>> {
        let active = self.ledger.get_active_count(event_id).await.map_err(map_ledger_err)?;
        let mut slots = self.config.max_concurrent_active.saturating_sub(active);

        let mut outcomes = Vec::new();
        if slots == 0 {
            outcomes.push(PromotionOutcome::Throttled);
            return Ok(outcomes);
        }

        loop {
            if slots == 0 {
                break;
            }
            let outcome = self.promote_one(event_id).await?;
            let stop = matches!(outcome, PromotionOutcome::Empty);
            let consumed_slot = matches!(outcome, PromotionOutcome::Promoted { .. });
            outcomes.push(outcome);
            if stop {
                break;
            }
            if consumed_slot {
                slots -= 1;
            }
        }
        Ok(outcomes)
    }

    /// Returns `Ok(None)` when this call lost the activation race against a
    /// concurrent promoter — the caller should retry against the next head.
    async fn admit(&self, event_id: EventId, user_id: UserId) -> Result<Option<PromotionOutcome>> {
        let reservation_id = ReservationId::from(Uuid::new_v4());
        let window = chrono::Duration::from_std(self.config.reservation_window)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));
        let deadline = self.clock.now() + window;

        let reservation = self
            .store
            .insert_reservation(reservation_id, event_id, user_id, deadline)
            .await;

        let reservation = match reservation {
            Ok(r) => r,
            Err(e) => {
                // restore: we already committed the decrement
                let _ = self.ledger.increment_seats(event_id).await;
                return Err(map_store_err(e));
            }
        };

        let activated = self
            .store
            .activate_queue_entry(event_id, user_id, reservation.id)
            .await
            .map_err(map_store_err)?;

        if !activated {
            // lost the race against another promoter for the same head;
            // our decrement is surplus, and the reservation we just wrote
            // is orphaned — restore the seat and let the mirror's next
            // reconciliation sweep notice the orphaned PENDING_PAYMENT row.
            warn!(%event_id, %user_id, "promotion lost the activation race, restoring seat");
            self.ledger.increment_seats(event_id).await.map_err(map_ledger_err)?;
            return Ok(None);
        }

        self.ledger
            .remove_from_queue(event_id, user_id)
            .await
            .map_err(map_ledger_err)?;
        self.ledger
            .set_active(event_id, user_id, self.config.reservation_window)
            .await
            .map_err(map_ledger_err)?;

        info!(%event_id, %user_id, reservation_id = %reservation.id, "promotion admitted");

        self.notifier
            .notify(
                user_id,
                Notification::QueueActive {
                    event_id,
                    reservation_id: reservation.id,
                    expires_at: deadline,
                },
            )
            .await;

        Ok(Some(PromotionOutcome::Promoted { user_id, reservation_id: reservation.id }))
    }

    async fn reject_sold_out(&self, event_id: EventId, user_id: UserId) -> Result<PromotionOutcome> {
        self.ledger.increment_seats(event_id).await.map_err(map_ledger_err)?;
        self.store
            .mark_queue_entry_expired(event_id, user_id)
            .await
            .map_err(map_store_err)?;
        self.ledger.remove_from_queue(event_id, user_id).await.map_err(map_ledger_err)?;

        info!(%event_id, %user_id, "promotion found event sold out");

        self.notifier.notify(user_id, Notification::QueueSoldOut { event_id }).await;

        Ok(PromotionOutcome::SoldOut { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueueConfig;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use ticketq_core::SystemClock;
    use ticketq_ledger::InMemoryLedger;
    use ticketq_notify::NullNotifier;
    use ticketq_store::InMemoryStore;

    type TestSystem = QueueSystem<InMemoryLedger, InMemoryStore, NullNotifier, SystemClock>;

    async fn system_with_seats(total_seats: u32) -> (TestSystem, EventId) {
        let ledger = Arc::new(InMemoryLedger::new());
        let store = Arc::new(InMemoryStore::new());
        let event = store
            .create_event("Test", total_seats, Utc::now() - Duration::minutes(1), Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        ledger.initialize_seats(event.id, total_seats).await.unwrap();
        (
            QueueSystem::new(ledger, store, Arc::new(NullNotifier), Arc::new(SystemClock), QueueConfig::default()),
            event.id,
        )
    }

    #[tokio::test]
    async fn single_admission() {
        let (system, event_id) = system_with_seats(1).await;
        let user = UserId::new();
        system.join(event_id, user).await.unwrap();

        let outcome = system.promote_one(event_id).await.unwrap();
        assert!(matches!(outcome, PromotionOutcome::Promoted { user_id, .. } if user_id == user));
        assert_eq!(system.ledger.get_remaining_seats(event_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn last_seat_stampede() {
        let (system, event_id) = system_with_seats(1).await;
        let mut users = Vec::new();
        for _ in 0..10 {
            let u = UserId::new();
            system.join(event_id, u).await.unwrap();
            users.push(u);
        }

        let outcomes = system.promote_batch(event_id).await.unwrap();
        let promoted = outcomes.iter().filter(|o| matches!(o, PromotionOutcome::Promoted { .. })).count();
        let sold_out = outcomes.iter().filter(|o| matches!(o, PromotionOutcome::SoldOut { .. })).count();

        assert_eq!(promoted, 1);
        assert_eq!(sold_out, 9);
        assert_eq!(system.ledger.get_remaining_seats(event_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn promote_batch_respects_admission_cap() {
        let (mut system, event_id) = system_with_seats(10).await;
        system.config.max_concurrent_active = 2;
        for _ in 0..5 {
            system.join(event_id, UserId::new()).await.unwrap();
        }

        let outcomes = system.promote_batch(event_id).await.unwrap();
        let promoted = outcomes.iter().filter(|o| matches!(o, PromotionOutcome::Promoted { .. })).count();
        assert_eq!(promoted, 2);
    }

    #[tokio::test]
    async fn active_marker_ttl_matches_reservation_deadline() {
        let (system, event_id) = system_with_seats(1).await;
        let user = UserId::new();
        system.join(event_id, user).await.unwrap();

        let before = Utc::now();
        let PromotionOutcome::Promoted { reservation_id, .. } = system.promote_one(event_id).await.unwrap() else {
            panic!("expected promotion");
        };

        let reservation = system.store.get_reservation(reservation_id).await.unwrap().unwrap();
        let expiry = system.ledger.active_expiry(event_id, user).unwrap();

        // `set_active`'s ttl is derived from the same `reservation_window`
        // used to compute the reservation's deadline, so the two clocks
        // should land within a second of each other.
        let drift = (expiry - reservation.deadline).num_seconds().abs();
        assert!(drift <= 1, "active marker expiry drifted {drift}s from the reservation deadline");
        assert!(expiry > before);
    }

    #[tokio::test]
    async fn concurrent_promoters_never_oversell() {
        let (system, event_id) = system_with_seats(5).await;
        for _ in 0..20 {
            system.join(event_id, UserId::new()).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..20 {
            let system = system.clone();
            handles.push(tokio::spawn(async move { system.promote_one(event_id).await }));
        }

        let mut promoted = 0;
        for h in handles {
            if let Ok(Ok(PromotionOutcome::Promoted { .. })) = h.await {
                promoted += 1;
            }
        }

        assert_eq!(promoted, 5);
        assert_eq!(system.ledger.get_remaining_seats(event_id).await.unwrap(), 0);
    }
}
