//! Redis-backed record store.
//!
//! Uses a `ConnectionManager` (multiplexed, auto-reconnecting), cloned into
//! each call so concurrent record processors share one connection without
//! extra locking. Redis provides the only concurrency control.

use std::time::Duration;

use redis::aio::ConnectionManager;
use tracing::instrument;

use super::record_store::{RecordStore, RecordStoreError, ScanPage};

#[derive(Clone)]
pub struct RedisRecordStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRecordStore").finish_non_exhaustive()
    }
}

impl RedisRecordStore {
    /// Connect to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub async fn connect(redis_url: impl AsRef<str>) -> Result<Self, RecordStoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RecordStoreError::Connection(e.to_string()))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| RecordStoreError::Connection(e.to_string()))?;

        Ok(Self { conn })
    }
}

fn map_redis_error(command: &str, err: redis::RedisError) -> RecordStoreError {
    if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
        RecordStoreError::Connection(format!("{command} failed: {err}"))
    } else {
        RecordStoreError::Command(format!("{command} failed: {err}"))
    }
}

#[async_trait::async_trait]
impl RecordStore for RedisRecordStore {
    #[instrument(skip(self), err)]
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        page_size: usize,
    ) -> Result<ScanPage, RecordStoreError> {
        let mut conn = self.conn.clone();

        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(page_size)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("SCAN", e))?;

        Ok(ScanPage { keys, next_cursor })
    }

    async fn get(&self, key: &str) -> Result<String, RecordStoreError> {
        let mut conn = self.conn.clone();

        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("GET", e))?;

        value.ok_or_else(|| RecordStoreError::NotFound(key.to_string()))
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), RecordStoreError> {
        let mut conn = self.conn.clone();

        // SET with EX; a zero-second expiry is rejected by Redis, so round up.
        let seconds = ttl.as_secs().max(1);
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("SET", e))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RecordStoreError> {
        let mut conn = self.conn.clone();

        // DEL returns the number of removed keys; zero is fine.
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("DEL", e))?;

        Ok(())
    }
}
