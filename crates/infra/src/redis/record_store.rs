use std::sync::Arc;
use std::time::Duration;

/// One bounded page of a cursor scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub keys: Vec<String>,
    /// Cursor for the next call. Zero means the pass over the keyspace is complete.
    pub next_cursor: u64,
}

impl ScanPage {
    pub fn is_final(&self) -> bool {
        self.next_cursor == 0
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RecordStoreError {
    /// The key vanished between scan and fetch (claimed elsewhere or expired).
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("store connection error: {0}")]
    Connection(String),

    #[error("store command error: {0}")]
    Command(String),
}

/// Key-value store holding pending records.
///
/// Implementations are shared by the dispatch loop and every concurrently
/// running record processor; they must be safe for concurrent use without
/// additional locking by the caller.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Enumerate one page of keys matching a glob `pattern`, starting at `cursor`.
    ///
    /// `page_size` is a hint; a page may hold fewer (or no) keys while the
    /// scan is still in progress. Callers loop until `next_cursor == 0` for
    /// full coverage.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        page_size: usize,
    ) -> Result<ScanPage, RecordStoreError>;

    /// Fetch a raw value. A missing key is `RecordStoreError::NotFound`.
    async fn get(&self, key: &str) -> Result<String, RecordStoreError>;

    /// Write a value that expires after `ttl`.
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), RecordStoreError>;

    /// Delete a key. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), RecordStoreError>;
}

#[async_trait::async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        page_size: usize,
    ) -> Result<ScanPage, RecordStoreError> {
        (**self).scan(cursor, pattern, page_size).await
    }

    async fn get(&self, key: &str) -> Result<String, RecordStoreError> {
        (**self).get(key).await
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), RecordStoreError> {
        (**self).set_with_expiry(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), RecordStoreError> {
        (**self).delete(key).await
    }
}
