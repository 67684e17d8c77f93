//! Production `Ledger` backed by Redis.
//!
//! Multi-key operations collapse into a single atomic unit wherever the
//! coordinator supports scripting. Redis does, via `EVAL`, so
//! `add_to_queue` and `clear_active` are each one round trip through a Lua
//! script rather than a check-then-act pair of commands.

use crate::{Ledger, LedgerError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;
use ticketq_core::{EventId, ReservationId, UserId};
use tracing::{debug, warn};
use uuid::Uuid;

fn seats_key(event_id: EventId) -> String {
    format!("seats:{event_id}")
}

fn queue_key(event_id: EventId) -> String {
    format!("queue:{event_id}")
}

fn queue_seq_key(event_id: EventId) -> String {
    format!("queueseq:{event_id}")
}

fn active_key(event_id: EventId, user_id: UserId) -> String {
    format!("active:{event_id}:{user_id}")
}

fn active_count_key(event_id: EventId) -> String {
    format!("activeCount:{event_id}")
}

fn expired_key(reservation_id: ReservationId) -> String {
    format!("expired:{reservation_id}")
}

/// Adds `member` to `queue_key` with a fresh monotonic score if absent,
/// then returns its 1-based rank. The score comes from a per-event sequence
/// counter rather than a wall-clock timestamp, so total order is exact even
/// when many joins land in the same millisecond.
const ADD_TO_QUEUE_SCRIPT: &str = r"
local queue_key = KEYS[1]
local seq_key = KEYS[2]
local member = ARGV[1]
if redis.call('ZSCORE', queue_key, member) == false then
    local seq = redis.call('INCR', seq_key)
    redis.call('ZADD', queue_key, 'NX', seq, member)
end
local rank = redis.call('ZRANK', queue_key, member)
return rank + 1
";

/// Deletes the active marker and decrements the count iff it existed,
/// in one round trip so the counter can never drift from a racing clear.
const CLEAR_ACTIVE_SCRIPT: &str = r"
local active_key = KEYS[1]
local count_key = KEYS[2]
local deleted = redis.call('DEL', active_key)
if deleted == 1 then
    redis.call('DECR', count_key)
end
return deleted
";

pub struct RedisLedger {
    conn: ConnectionManager,
}

impl RedisLedger {
    /// Connects to `redis_url`, establishing the `ConnectionManager` that
    /// transparently reconnects on transient failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial connection cannot be established.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Ledger for RedisLedger {
    async fn initialize_seats(&self, event_id: EventId, total: u32) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(seats_key(event_id), total)
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        debug!(%event_id, total, "seats initialized");
        Ok(())
    }

    async fn decrement_seats(&self, event_id: EventId) -> Result<i64> {
        let mut conn = self.conn.clone();
        let v: i64 = conn
            .decr(seats_key(event_id), 1)
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(v)
    }

    async fn increment_seats(&self, event_id: EventId) -> Result<i64> {
        let mut conn = self.conn.clone();
        let v: i64 = conn
            .incr(seats_key(event_id), 1)
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(v)
    }

    async fn get_remaining_seats(&self, event_id: EventId) -> Result<u32> {
        let mut conn = self.conn.clone();
        let v: Option<i64> = conn
            .get(seats_key(event_id))
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(v.unwrap_or(0).max(0) as u32)
    }

    async fn add_to_queue(&self, event_id: EventId, user_id: UserId) -> Result<u64> {
        let mut conn = self.conn.clone();
        let rank: u64 = Script::new(ADD_TO_QUEUE_SCRIPT)
            .key(queue_key(event_id))
            .key(queue_seq_key(event_id))
            .arg(user_id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(rank)
    }

    async fn get_queue_position(&self, event_id: EventId, user_id: UserId) -> Result<Option<u64>> {
        let mut conn = self.conn.clone();
        let rank: Option<u64> = conn
            .zrank(queue_key(event_id), user_id.to_string())
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(rank.map(|r| r + 1))
    }

    async fn get_queue_length(&self, event_id: EventId) -> Result<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn
            .zcard(queue_key(event_id))
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(len)
    }

    async fn peek_queue_head(&self, event_id: EventId) -> Result<Option<UserId>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .zrange(queue_key(event_id), 0, 0)
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        members
            .into_iter()
            .next()
            .map(|m| {
                m.parse::<Uuid>()
                    .map(UserId::from)
                    .map_err(|_| LedgerError::Backend(format!("corrupt queue member: {m}")))
            })
            .transpose()
    }

    async fn remove_from_queue(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.zrem::<_, _, ()>(queue_key(event_id), user_id.to_string())
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn set_active(&self, event_id: EventId, user_id: UserId, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        conn.set_ex::<_, _, ()>(active_key(event_id, user_id), "1", millis.div_ceil(1000).max(1))
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        conn.incr::<_, _, ()>(active_count_key(event_id), 1)
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn is_active(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(active_key(event_id, user_id))
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(exists)
    }

    async fn clear_active(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let mut conn = self.conn.clone();
        let deleted: i64 = Script::new(CLEAR_ACTIVE_SCRIPT)
            .key(active_key(event_id, user_id))
            .key(active_count_key(event_id))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        if deleted == 0 {
            warn!(%event_id, %user_id, "clear_active called on an already-absent marker");
        }
        Ok(())
    }

    async fn get_active_count(&self, event_id: EventId) -> Result<u64> {
        let mut conn = self.conn.clone();
        let v: Option<i64> = conn
            .get(active_count_key(event_id))
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(v.unwrap_or(0).max(0) as u64)
    }

    async fn claim_expiration(&self, reservation_id: ReservationId) -> Result<bool> {
        let mut conn = self.conn.clone();
        let fence_secs = crate::EXPIRATION_FENCE_TTL.as_secs();
        let claimed: bool = redis::cmd("SET")
            .arg(expired_key(reservation_id))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(fence_secs)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?
            .is_some();
        Ok(claimed)
    }
}
