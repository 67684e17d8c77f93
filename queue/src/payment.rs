//! Payment protocol. Payment and expiration race on the same conditional
//! update; exactly one of the two ever wins.

use crate::{map_ledger_err, map_store_err, QueueSystem};
use ticketq_core::{Clock, Reservation, Result, ReservationId, ReservationStatus, TicketingError, UserId};
use ticketq_ledger::Ledger;
use ticketq_notify::{Notification, Notifier};
use ticketq_store::Store;
use tracing::info;

impl<L, S, N, C> QueueSystem<L, S, N, C>
where
    L: Ledger,
    S: Store,
    N: Notifier,
    C: Clock,
{
    /// Runs the payment protocol. Never touches the seat ledger — payment
    /// leaves `seats:E` unchanged; only expiration moves it.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the reservation does not exist.
    /// - `Forbidden` if `claimant` does not own the reservation.
    /// - `Validation` if the reservation is already terminal or its deadline
    ///   has elapsed (the expiration pipeline, not this call, performs the
    ///   actual terminal transition in that case).
    pub async fn pay(&self, reservation_id: ReservationId, claimant: UserId) -> Result<Reservation> {
        let reservation = self
            .store
            .get_reservation(reservation_id)
            .await
            .map_err(map_store_err)?
            .ok_or_else(|| TicketingError::not_found("reservation", reservation_id))?;

        if reservation.user_id != claimant {
            return Err(TicketingError::Forbidden("reservation belongs to a different user".to_string()));
        }

        if reservation.status != ReservationStatus::PendingPayment {
            return Err(TicketingError::validation("reservation is not pending payment"));
        }

        if reservation.deadline <= self.clock.now() {
            return Err(TicketingError::validation("reservation has expired"));
        }

        let paid_at = self.clock.now();
        let won = self
            .store
            .mark_reservation_paid(reservation_id, paid_at)
            .await
            .map_err(map_store_err)?;

        if !won {
            // lost the race to the expiration pipeline between our read
            // above and this conditional update.
            return Err(TicketingError::validation("reservation has expired"));
        }

        self.store
            .mark_queue_entry_done(reservation.event_id, reservation.user_id)
            .await
            .map_err(map_store_err)?;

        info!(%reservation_id, user_id = %claimant, "reservation paid");

        self.notifier
            .notify(
                claimant,
                Notification::ReservationPaid { reservation_id, event_id: reservation.event_id, paid_at },
            )
            .await;

        Ok(Reservation {
            status: ReservationStatus::Paid,
            paid_at: Some(paid_at),
            ..reservation
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promotion::PromotionOutcome;
    use crate::QueueConfig;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use ticketq_core::clock::test_support::FixedClock;
    use ticketq_core::{EventId, QueueStatus};
    use ticketq_ledger::InMemoryLedger;
    use ticketq_notify::NullNotifier;
    use ticketq_store::InMemoryStore;

    type TestSystem = QueueSystem<InMemoryLedger, InMemoryStore, NullNotifier, FixedClock>;

    async fn promoted_reservation() -> (TestSystem, EventId, UserId, ReservationId) {
        let ledger = Arc::new(InMemoryLedger::new());
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let event = store
            .create_event("Test", 1, Utc::now() - Duration::minutes(1), Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        ledger.initialize_seats(event.id, 1).await.unwrap();
        let system = QueueSystem::new(ledger, store, Arc::new(NullNotifier), clock, QueueConfig::default());

        let user = UserId::new();
        system.join(event.id, user).await.unwrap();
        let PromotionOutcome::Promoted { reservation_id, .. } = system.promote_one(event.id).await.unwrap() else {
            panic!("expected promotion");
        };

        (system, event.id, user, reservation_id)
    }

    #[tokio::test]
    async fn single_admission_pays_successfully() {
        let (system, event_id, user, reservation_id) = promoted_reservation().await;

        let reservation = system.pay(reservation_id, user).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Paid);

        let entry = system.store.get_queue_entry(event_id, user).await.unwrap().unwrap();
        assert_eq!(entry.status, QueueStatus::Done);
        assert_eq!(system.ledger.get_remaining_seats(event_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn wrong_owner_is_forbidden() {
        let (system, _event_id, _user, reservation_id) = promoted_reservation().await;
        let stranger = UserId::new();

        let err = system.pay(reservation_id, stranger).await.unwrap_err();
        assert!(matches!(err, TicketingError::Forbidden(_)));

        let reservation = system.store.get_reservation(reservation_id).await.unwrap().unwrap();
        assert_eq!(reservation.status, ReservationStatus::PendingPayment);
    }

    #[tokio::test]
    async fn payment_after_expiration_fails() {
        let (system, _event_id, user, reservation_id) = promoted_reservation().await;
        system.expire_reservation(reservation_id).await.unwrap();

        let err = system.pay(reservation_id, user).await.unwrap_err();
        assert!(matches!(err, TicketingError::Validation(_)));
    }
}
