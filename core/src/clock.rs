//! Clock abstraction: a single `now()` seam so tests can inject a fixed
//! time instead of depending on the wall clock.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_support {
    use super::Clock;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Fixed clock for deterministic tests; `advance` moves it forward.
    pub struct FixedClock {
        micros: AtomicI64,
    }

    impl FixedClock {
        #[must_use]
        pub fn new(at: DateTime<Utc>) -> Self {
            Self {
                micros: AtomicI64::new(at.timestamp_micros()),
            }
        }

        pub fn advance(&self, duration: chrono::Duration) {
            self.micros
                .fetch_add(duration.num_microseconds().unwrap_or(0), Ordering::SeqCst);
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst))
                .unwrap_or_else(Utc::now)
        }
    }
}
