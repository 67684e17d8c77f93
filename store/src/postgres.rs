//! Postgres-backed `Store`. Queries are written with `sqlx::query`/`query_as`
//! rather than the `query!` macro family, so the crate builds without a live
//! database connection or a checked offline query cache.

use crate::{
    reservation_status_from_str, reservation_status_to_str, role_from_str, role_to_str,
    status_from_str, status_to_str, Result, Store, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use ticketq_core::{
    Event, EventId, QueueEntry, QueueEntryId, QueueStatus, Reservation, ReservationCounts,
    ReservationId, ReservationStatus, Role, User, UserId,
};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects to `database_url` and returns a ready-to-use store.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Runs the bundled migrations. Called once at startup.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails to apply.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_user(&self, email: &str, password_hash: &str, name: &str, role: Role) -> Result<User> {
        let id = UserId::new();
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, role) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id.as_uuid())
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(role_to_str(role))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(User {
            id,
            email: email.to_string(),
            name: name.to_string(),
            role,
        })
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, email, name, role FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(|r| User {
            id: UserId::from_uuid(r.get("id")),
            email: r.get("email"),
            name: r.get("name"),
            role: role_from_str(r.get::<String, _>("role").as_str()),
        }))
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, email, name, role FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(|r| User {
            id,
            email: r.get("email"),
            name: r.get("name"),
            role: role_from_str(r.get::<String, _>("role").as_str()),
        }))
    }

    async fn get_credentials_by_email(&self, email: &str) -> Result<Option<(User, String)>> {
        let row = sqlx::query("SELECT id, email, name, role, password_hash FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(|r| {
            let user = User {
                id: UserId::from_uuid(r.get("id")),
                email: r.get("email"),
                name: r.get("name"),
                role: role_from_str(r.get::<String, _>("role").as_str()),
            };
            let hash: String = r.get("password_hash");
            (user, hash)
        }))
    }

    async fn create_event(
        &self,
        name: &str,
        total_seats: u32,
        sales_start_at: DateTime<Utc>,
        sales_end_at: DateTime<Utc>,
    ) -> Result<Event> {
        let id = EventId::new();
        sqlx::query(
            "INSERT INTO events (id, name, total_seats, sales_start_at, sales_end_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id.as_uuid())
        .bind(name)
        .bind(i64::from(total_seats))
        .bind(sales_start_at)
        .bind(sales_end_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(Event {
            id,
            name: name.to_string(),
            total_seats,
            sales_start_at,
            sales_end_at,
        })
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
        let row = sqlx::query(
            "SELECT name, total_seats, sales_start_at, sales_end_at FROM events WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(|r| Event {
            id,
            name: r.get("name"),
            total_seats: r.get::<i64, _>("total_seats") as u32,
            sales_start_at: r.get("sales_start_at"),
            sales_end_at: r.get("sales_end_at"),
        }))
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        let rows = sqlx::query(
            "SELECT id, name, total_seats, sales_start_at, sales_end_at FROM events ORDER BY sales_start_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows
            .into_iter()
            .map(|r| Event {
                id: EventId::from_uuid(r.get("id")),
                name: r.get("name"),
                total_seats: r.get::<i64, _>("total_seats") as u32,
                sales_start_at: r.get("sales_start_at"),
                sales_end_at: r.get("sales_end_at"),
            })
            .collect())
    }

    async fn insert_waiting_entry(&self, event_id: EventId, user_id: UserId, join_position: u64) -> Result<QueueEntry> {
        let id = QueueEntryId::new();
        sqlx::query(
            "INSERT INTO queue_entries (id, event_id, user_id, status, join_position) VALUES ($1, $2, $3, 'WAITING', $4)",
        )
        .bind(id.as_uuid())
        .bind(event_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(join_position as i64)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(QueueEntry {
            id,
            event_id,
            user_id,
            status: QueueStatus::Waiting,
            reservation_id: None,
            join_position,
        })
    }

    async fn get_queue_entry(&self, event_id: EventId, user_id: UserId) -> Result<Option<QueueEntry>> {
        let row = sqlx::query(
            "SELECT id, status, reservation_id, join_position FROM queue_entries WHERE event_id = $1 AND user_id = $2",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(|r| QueueEntry {
            id: QueueEntryId::from_uuid(r.get("id")),
            event_id,
            user_id,
            status: status_from_str(r.get::<String, _>("status").as_str()),
            reservation_id: r
                .get::<Option<uuid::Uuid>, _>("reservation_id")
                .map(ReservationId::from_uuid),
            join_position: r.get::<i64, _>("join_position") as u64,
        }))
    }

    async fn activate_queue_entry(
        &self,
        event_id: EventId,
        user_id: UserId,
        reservation_id: ReservationId,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE queue_entries SET status = 'ACTIVE', reservation_id = $3, updated_at = now() \
             WHERE event_id = $1 AND user_id = $2 AND status = 'WAITING'",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(reservation_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_queue_entry_done(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE queue_entries SET status = 'DONE', updated_at = now() \
             WHERE event_id = $1 AND user_id = $2 AND status = 'ACTIVE'",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_queue_entry_expired(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE queue_entries SET status = 'EXPIRED', updated_at = now() \
             WHERE event_id = $1 AND user_id = $2 AND status IN ('WAITING', 'ACTIVE')",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_reservation(
        &self,
        id: ReservationId,
        event_id: EventId,
        user_id: UserId,
        deadline: DateTime<Utc>,
    ) -> Result<Reservation> {
        sqlx::query(
            "INSERT INTO reservations (id, event_id, user_id, status, deadline) VALUES ($1, $2, $3, 'PENDING_PAYMENT', $4)",
        )
        .bind(id.as_uuid())
        .bind(event_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(deadline)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(Reservation {
            id,
            event_id,
            user_id,
            status: ReservationStatus::PendingPayment,
            deadline,
            paid_at: None,
        })
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        let row = sqlx::query(
            "SELECT event_id, user_id, status, deadline, paid_at FROM reservations WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(|r| Reservation {
            id,
            event_id: EventId::from_uuid(r.get("event_id")),
            user_id: UserId::from_uuid(r.get("user_id")),
            status: reservation_status_from_str(r.get::<String, _>("status").as_str()),
            deadline: r.get("deadline"),
            paid_at: r.get("paid_at"),
        }))
    }

    async fn mark_reservation_paid(&self, id: ReservationId, paid_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reservations SET status = 'PAID', paid_at = $2 WHERE id = $1 AND status = 'PENDING_PAYMENT'",
        )
        .bind(id.as_uuid())
        .bind(paid_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_reservation_expired(&self, id: ReservationId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reservations SET status = 'EXPIRED' WHERE id = $1 AND status = 'PENDING_PAYMENT'",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_elapsed_pending_reservations(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(
            "SELECT id, event_id, user_id, deadline, paid_at FROM reservations \
             WHERE status = 'PENDING_PAYMENT' AND deadline <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows
            .into_iter()
            .map(|r| Reservation {
                id: ReservationId::from_uuid(r.get("id")),
                event_id: EventId::from_uuid(r.get("event_id")),
                user_id: UserId::from_uuid(r.get("user_id")),
                status: ReservationStatus::PendingPayment,
                deadline: r.get("deadline"),
                paid_at: r.get("paid_at"),
            })
            .collect())
    }

    async fn reservation_counts(&self, event_id: EventId) -> Result<ReservationCounts> {
        let rows = sqlx::query(
            "SELECT status, count(*) as n FROM reservations WHERE event_id = $1 GROUP BY status",
        )
        .bind(event_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let mut counts = ReservationCounts::default();
        for row in rows {
            let status: String = row.get("status");
            let n: i64 = row.get("n");
            match reservation_status_to_str(reservation_status_from_str(&status)) {
                "PENDING_PAYMENT" => counts.pending_payment = n as u64,
                "PAID" => counts.paid = n as u64,
                "EXPIRED" => counts.expired = n as u64,
                _ => {}
            }
        }
        Ok(counts)
    }
}
