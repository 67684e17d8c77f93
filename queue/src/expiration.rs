//! Expiration pipeline — returns an abandoned seat to the pool exactly once
//! per reservation, however many times the sweep or a retried job
//! redelivers it.

use crate::{map_ledger_err, map_store_err, QueueSystem};
use ticketq_core::{Clock, Result, ReservationId, ReservationStatus};
use ticketq_ledger::Ledger;
use ticketq_notify::{Notification, Notifier};
use ticketq_store::Store;
use tracing::{info, warn};

impl<L, S, N, C> QueueSystem<L, S, N, C>
where
    L: Ledger,
    S: Store,
    N: Notifier,
    C: Clock,
{
    /// Runs the full expiration sequence for a single reservation. Safe to
    /// call concurrently and repeatedly for the same `reservation_id`: the
    /// fence normally lets only the winning caller perform the seat return,
    /// but if that caller crashed before finishing, a retry detects the
    /// still-`PENDING_PAYMENT` reservation and resumes the sequence instead
    /// of treating the claimed fence as proof of completion.
    ///
    /// # Errors
    ///
    /// Returns `Internal` on a ledger or store failure. A reservation that
    /// is absent or already terminal is not an error — both are the
    /// documented benign early-returns.
    pub async fn expire_reservation(&self, reservation_id: ReservationId) -> Result<()> {
        let Some(reservation) = self.store.get_reservation(reservation_id).await.map_err(map_store_err)? else {
            info!(%reservation_id, "expiration job outlived its reservation");
            return Ok(());
        };

        if reservation.status != ReservationStatus::PendingPayment {
            return Ok(());
        }

        if !self.ledger.claim_expiration(reservation_id).await.map_err(map_ledger_err)? {
            // Another caller already claimed the fence — possibly this same
            // reservation's own earlier attempt, which may have crashed
            // before finishing the sequence below. The status check at the
            // top of this function only gates a fresh invocation; it says
            // nothing about whether that earlier attempt completed. Re-read
            // the reservation now: if it's still PENDING_PAYMENT, the prior
            // claimant never reached `mark_reservation_expired`, and we must
            // resume the remaining steps ourselves rather than leave the
            // reservation stuck and its seat never re-offered.
            let recheck = self.store.get_reservation(reservation_id).await.map_err(map_store_err)?;
            match recheck {
                Some(r) if r.status == ReservationStatus::PendingPayment => {
                    warn!(%reservation_id, "resuming an expiration sequence a previous claimant left incomplete");
                }
                _ => {
                    info!(%reservation_id, "expiration already completed by another caller");
                    return Ok(());
                }
            }
        }

        self.ledger.increment_seats(reservation.event_id).await.map_err(map_ledger_err)?;

        let expired = self.store.mark_reservation_expired(reservation_id).await.map_err(map_store_err)?;
        if !expired {
            // lost the payment race after claiming the fence: the ledger
            // move already happened above, and that's accepted as the
            // fence's job.
            warn!(%reservation_id, "reservation was paid before expiration committed");
            return Ok(());
        }

        self.store
            .mark_queue_entry_expired(reservation.event_id, reservation.user_id)
            .await
            .map_err(map_store_err)?;
        self.ledger
            .clear_active(reservation.event_id, reservation.user_id)
            .await
            .map_err(map_ledger_err)?;

        info!(%reservation_id, event_id = %reservation.event_id, user_id = %reservation.user_id, "reservation expired");

        self.notifier
            .notify(
                reservation.user_id,
                Notification::ReservationExpired { reservation_id, event_id: reservation.event_id },
            )
            .await;

        self.promote_batch(reservation.event_id).await?;

        Ok(())
    }

    /// Scans the store for elapsed `PENDING_PAYMENT` reservations and feeds
    /// each into `expire_reservation` — the sweep strategy chosen over
    /// per-reservation delayed jobs.
    ///
    /// # Errors
    ///
    /// Returns the first error from `store.find_elapsed_pending_reservations`;
    /// individual `expire_reservation` failures are logged and do not abort
    /// the sweep of the remaining reservations.
    pub async fn sweep_expired_reservations(&self) -> Result<usize> {
        let now = self.clock.now();
        let elapsed = self
            .store
            .find_elapsed_pending_reservations(now)
            .await
            .map_err(map_store_err)?;

        let mut processed = 0;
        for reservation in elapsed {
            if let Err(e) = self.expire_reservation(reservation.id).await {
                warn!(reservation_id = %reservation.id, error = %e, "sweep failed to expire reservation");
            } else {
                processed += 1;
            }
        }
        Ok(processed)
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
    use ticketq_core::{EventId, UserId};
    use ticketq_ledger::InMemoryLedger;
    use ticketq_notify::NullNotifier;
    use ticketq_store::InMemoryStore;

    type TestSystem = QueueSystem<InMemoryLedger, InMemoryStore, NullNotifier, FixedClock>;

    async fn system_with_one_seat() -> (TestSystem, EventId) {
        let ledger = Arc::new(InMemoryLedger::new());
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let event = store
            .create_event("Test", 1, Utc::now() - Duration::minutes(1), Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        ledger.initialize_seats(event.id, 1).await.unwrap();
        (
            QueueSystem::new(ledger, store, Arc::new(NullNotifier), clock, QueueConfig::default()),
            event.id,
        )
    }

    #[tokio::test]
    async fn return_and_readmit() {
        let (system, event_id) = system_with_one_seat().await;
        let a = UserId::new();
        let b = UserId::new();
        system.join(event_id, a).await.unwrap();

        let outcome = system.promote_one(event_id).await.unwrap();
        let PromotionOutcome::Promoted { reservation_id, .. } = outcome else {
            panic!("expected promotion");
        };

        system.join(event_id, b).await.unwrap();

        system.expire_reservation(reservation_id).await.unwrap();

        let a_reservation = system.store.get_reservation(reservation_id).await.unwrap().unwrap();
        assert_eq!(a_reservation.status, ReservationStatus::Expired);

        let b_entry = system.store.get_queue_entry(event_id, b).await.unwrap().unwrap();
        assert_eq!(b_entry.status, ticketq_core::QueueStatus::Active);
    }

    #[tokio::test]
    async fn expiration_storm_increments_seats_exactly_once() {
        let (system, event_id) = system_with_one_seat().await;
        let user = UserId::new();
        system.join(event_id, user).await.unwrap();
        let PromotionOutcome::Promoted { reservation_id, .. } = system.promote_one(event_id).await.unwrap() else {
            panic!("expected promotion");
        };

        let mut handles = Vec::new();
        for _ in 0..5 {
            let system = system.clone();
            handles.push(tokio::spawn(async move { system.expire_reservation(reservation_id).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(system.ledger.get_remaining_seats(event_id).await.unwrap(), 1);
        let reservation = system.store.get_reservation(reservation_id).await.unwrap().unwrap();
        assert_eq!(reservation.status, ReservationStatus::Expired);
    }

    #[tokio::test]
    async fn resumes_after_a_claimant_that_never_completed() {
        let (system, event_id) = system_with_one_seat().await;
        let user = UserId::new();
        system.join(event_id, user).await.unwrap();
        let PromotionOutcome::Promoted { reservation_id, .. } = system.promote_one(event_id).await.unwrap() else {
            panic!("expected promotion");
        };

        // Simulate a crashed expiration attempt: it claimed the fence but
        // never reached `mark_reservation_expired`.
        assert!(system.ledger.claim_expiration(reservation_id).await.unwrap());

        system.expire_reservation(reservation_id).await.unwrap();

        let reservation = system.store.get_reservation(reservation_id).await.unwrap().unwrap();
        assert_eq!(reservation.status, ReservationStatus::Expired);
        assert_eq!(system.ledger.get_remaining_seats(event_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn sweep_only_touches_elapsed_reservations() {
        let (system, event_id) = system_with_one_seat().await;
        let user = UserId::new();
        system.join(event_id, user).await.unwrap();
        system.promote_one(event_id).await.unwrap();

        assert_eq!(system.sweep_expired_reservations().await.unwrap(), 0);

        system.clock.advance(Duration::seconds(301));
        assert_eq!(system.sweep_expired_reservations().await.unwrap(), 1);
    }
}
