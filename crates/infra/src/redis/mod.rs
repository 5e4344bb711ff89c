//! Record Store Adapter: the shared key-value namespace holding pending records.
//!
//! - `RecordStore`: scan/get/set-with-expiry/delete boundary
//! - `InMemoryRecordStore`: tests/dev
//! - `RedisRecordStore`: Redis via a multiplexed connection manager (`redis` feature)

pub mod in_memory;
pub mod record_store;
#[cfg(feature = "redis")]
pub mod redis_store;

pub use in_memory::InMemoryRecordStore;
pub use record_store::{RecordStore, RecordStoreError, ScanPage};
#[cfg(feature = "redis")]
pub use redis_store::RedisRecordStore;
