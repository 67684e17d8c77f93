//! # Ticketing Queue Notify
//!
//! The server-push channel: one room per user, carrying the five
//! notification events. Delivery is best-effort by design — a client that
//! misses an event still sees the truth by polling `queue/me`, so
//! publishing never blocks the caller and never fails loudly when nobody is
//! listening.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use ticketq_core::{EventId, QueueStatus, ReservationId, UserId};
use tokio::sync::mpsc;
use tracing::trace;

/// One of the five push events a user's connection may receive.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum Notification {
    #[serde(rename = "queue:position")]
    QueuePosition {
        event_id: EventId,
        position: u64,
        status: QueueStatus,
    },
    #[serde(rename = "queue:active")]
    QueueActive {
        event_id: EventId,
        reservation_id: ReservationId,
        expires_at: DateTime<Utc>,
    },
    #[serde(rename = "queue:soldout")]
    QueueSoldOut { event_id: EventId },
    #[serde(rename = "reservation:expired")]
    ReservationExpired {
        reservation_id: ReservationId,
        event_id: EventId,
    },
    #[serde(rename = "reservation:paid")]
    ReservationPaid {
        reservation_id: ReservationId,
        event_id: EventId,
        paid_at: DateTime<Utc>,
    },
}

/// A sink for best-effort, per-user notifications. Implementations MUST NOT
/// block: every call site in the promotion engine, expiration pipeline and
/// payment service treats this as fire-and-forget.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: UserId, notification: Notification);
}

/// In-process fan-out hub: one unbounded channel per connected user. A user
/// with no open connection simply drops the notification, which is the
/// correct behavior for a best-effort channel.
#[derive(Default)]
pub struct Hub {
    connections: Mutex<HashMap<UserId, mpsc::UnboundedSender<Notification>>>,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection for `user_id`, replacing any previous one.
    /// Returns the sending half (so the caller can later call `unregister`
    /// with the same handle) and the receiving half the transport handler
    /// should forward to the socket.
    pub fn register(&self, user_id: UserId) -> (mpsc::UnboundedSender<Notification>, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        connections.insert(user_id, tx.clone());
        (tx, rx)
    }

    /// Drops the registered connection for `user_id`, if it is still the one
    /// passed in (a newer connection may have already replaced it).
    pub fn unregister(&self, user_id: UserId, sender: &mpsc::UnboundedSender<Notification>) {
        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        if let std::collections::hash_map::Entry::Occupied(entry) = connections.entry(user_id) {
            if entry.get().same_channel(sender) {
                entry.remove();
            }
        }
    }
}

#[async_trait]
impl Notifier for Hub {
    async fn notify(&self, user_id: UserId, notification: Notification) {
        let sender = {
            let connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
            connections.get(&user_id).cloned()
        };
        match sender {
            Some(sender) => {
                if sender.send(notification).is_err() {
                    trace!(%user_id, "notification dropped: receiver gone");
                }
            }
            None => trace!(%user_id, "notification dropped: no open connection"),
        }
    }
}

/// No-op notifier for tests and tools that don't need the push channel.
#[derive(Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _user_id: UserId, _notification: Notification) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_registered_connection() {
        let hub = Hub::new();
        let user = UserId::new();
        let (_tx, mut rx) = hub.register(user);

        hub.notify(user, Notification::QueueSoldOut { event_id: EventId::new() }).await;

        let received = rx.recv().await;
        assert!(matches!(received, Some(Notification::QueueSoldOut { .. })));
    }

    #[tokio::test]
    async fn silently_drops_when_nobody_is_listening() {
        let hub = Hub::new();
        hub.notify(UserId::new(), Notification::QueueSoldOut { event_id: EventId::new() }).await;
    }

    #[tokio::test]
    async fn unregister_is_a_no_op_after_replacement() {
        let hub = Hub::new();
        let user = UserId::new();
        let (first_sender, _first_rx) = hub.register(user);
        let (_second_sender, _second_rx) = hub.register(user);

        // the stale sender must not evict the newer connection
        hub.unregister(user, &first_sender);
        assert!(hub.connections.lock().unwrap().contains_key(&user));
    }
}
