//! End-to-end scenarios against the in-memory fakes: a user's full path
//! through join, promotion, payment and expiration, with no live Postgres
//! or Redis needed to exercise the protocol logic.

use chrono::{Duration, Utc};
use std::sync::Arc;
use ticketq_core::clock::test_support::FixedClock;
use ticketq_core::{QueueStatus, ReservationStatus, UserId};
use ticketq_ledger::{InMemoryLedger, Ledger};
use ticketq_notify::NullNotifier;
use ticketq_queue::{PromotionOutcome, QueueConfig, QueueSystem};
use ticketq_store::{InMemoryStore, Store};

type TestSystem = QueueSystem<InMemoryLedger, InMemoryStore, NullNotifier, FixedClock>;

async fn new_system(total_seats: u32, reservation_window: Duration) -> (TestSystem, ticketq_core::EventId) {
    let ledger = Arc::new(InMemoryLedger::new());
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let event = store
        .create_event("Scenario", total_seats, Utc::now() - Duration::minutes(1), Utc::now() + Duration::hours(2))
        .await
        .unwrap();
    ledger.initialize_seats(event.id, total_seats).await.unwrap();
    let config = QueueConfig {
        reservation_window: reservation_window.to_std().unwrap(),
        max_concurrent_active: 500,
    };
    (QueueSystem::new(ledger, store, Arc::new(NullNotifier), clock, config), event.id)
}

#[tokio::test]
async fn join_promote_pay_happy_path() {
    let (system, event_id) = new_system(1, Duration::minutes(5)).await;
    let user = UserId::new();

    let joined = system.join(event_id, user).await.unwrap();
    assert_eq!(joined.status, QueueStatus::Waiting);
    assert_eq!(joined.position, Some(1));

    let outcomes = system.promote_batch(event_id).await.unwrap();
    let reservation_id = match outcomes.as_slice() {
        [PromotionOutcome::Promoted { reservation_id, .. }] => *reservation_id,
        other => panic!("expected a single promotion, got {other:?}"),
    };

    let status = system.status(event_id, user).await.unwrap();
    assert_eq!(status.status, QueueStatus::Active);
    assert_eq!(status.reservation_id, Some(reservation_id));

    let reservation = system.pay(reservation_id, user).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Paid);

    let final_status = system.status(event_id, user).await.unwrap();
    assert_eq!(final_status.status, QueueStatus::Done);
}

#[tokio::test]
async fn expired_reservation_returns_seat_to_the_next_waiter() {
    let (system, event_id) = new_system(1, Duration::minutes(5)).await;
    let first = UserId::new();
    let second = UserId::new();

    system.join(event_id, first).await.unwrap();
    system.join(event_id, second).await.unwrap();

    let outcomes = system.promote_batch(event_id).await.unwrap();
    assert!(matches!(outcomes.as_slice(), [PromotionOutcome::Promoted { user_id, .. }] if *user_id == first));

    let reservation_id = match outcomes.as_slice() {
        [PromotionOutcome::Promoted { reservation_id, .. }] => *reservation_id,
        other => panic!("unexpected outcome {other:?}"),
    };

    system.expire_reservation(reservation_id).await.unwrap();

    let first_status = system.status(event_id, first).await.unwrap();
    assert_eq!(first_status.status, QueueStatus::Expired);

    let second_status = system.status(event_id, second).await.unwrap();
    assert_eq!(second_status.status, QueueStatus::Active);
    assert!(second_status.reservation_id.is_some());

    assert_eq!(system.ledger.get_remaining_seats(event_id).await.unwrap(), 0);
}

#[tokio::test]
async fn payment_after_expiration_is_rejected() {
    let (system, event_id) = new_system(1, Duration::minutes(5)).await;
    let user = UserId::new();
    system.join(event_id, user).await.unwrap();

    let outcomes = system.promote_batch(event_id).await.unwrap();
    let reservation_id = match outcomes.as_slice() {
        [PromotionOutcome::Promoted { reservation_id, .. }] => *reservation_id,
        other => panic!("unexpected outcome {other:?}"),
    };

    system.expire_reservation(reservation_id).await.unwrap();

    let result = system.pay(reservation_id, user).await;
    assert!(result.is_err());
}
