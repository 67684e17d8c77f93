//! Property test: for any capacity and any number of joiners, promotion
//! never admits more than `total_seats` reservations and never leaves
//! `remaining_seats` negative.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use std::sync::Arc;
use ticketq_core::UserId;
use ticketq_ledger::{InMemoryLedger, Ledger};
use ticketq_notify::NullNotifier;
use ticketq_queue::{PromotionOutcome, QueueConfig, QueueSystem};
use ticketq_store::{InMemoryStore, Store};

fn promote_never_oversells(total_seats: u32, joiners: u32) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async move {
        let ledger = Arc::new(InMemoryLedger::new());
        let store = Arc::new(InMemoryStore::new());
        let event = store
            .create_event(
                "Property",
                total_seats,
                Utc::now() - Duration::minutes(1),
                Utc::now() + Duration::hours(1),
            )
            .await
            .unwrap();
        ledger.initialize_seats(event.id, total_seats).await.unwrap();

        let system = QueueSystem::new(
            ledger,
            store,
            Arc::new(NullNotifier),
            Arc::new(ticketq_core::SystemClock),
            QueueConfig { max_concurrent_active: u64::from(joiners) + 1, ..QueueConfig::default() },
        );

        for _ in 0..joiners {
            system.join(event.id, UserId::new()).await.unwrap();
        }

        let outcomes = system.promote_batch(event.id).await.unwrap();
        let promoted = outcomes.iter().filter(|o| matches!(o, PromotionOutcome::Promoted { .. })).count() as u32;

        assert!(promoted <= total_seats);
        let remaining = system.ledger.get_remaining_seats(event.id).await.unwrap();
        assert!(remaining <= total_seats);
    });
}

proptest! {
    #[test]
    fn never_oversells(total_seats in 0u32..20, joiners in 0u32..40) {
        promote_never_oversells(total_seats, joiners);
    }
}
