use std::sync::Arc;

use thiserror::Error;
use txworker_core::{LogEntry, PartnerRouting, RoutingCode};

/// Durable store operation error.
///
/// "No routing row" is not an error; it is `Ok(None)` from
/// [`DurableLog::find_partner_routing`].
#[derive(Debug, Clone, Error)]
pub enum DurableLogError {
    #[error("database connection error: {0}")]
    Connection(String),

    /// The insert was rejected (constraint violation, bad data, ...).
    #[error("log insert failed: {0}")]
    Insert(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("failed to decode row: {0}")]
    RowDecode(String),
}

/// Append-only transaction log plus read-only partner routing lookup.
#[async_trait::async_trait]
pub trait DurableLog: Send + Sync {
    /// Insert one log row. Errors are returned as-is; no internal retry.
    async fn insert_log_entry(&self, entry: &LogEntry) -> Result<(), DurableLogError>;

    /// Point lookup of the routing row for `(short_code, routing_code)`.
    async fn find_partner_routing(
        &self,
        short_code: &str,
        routing_code: RoutingCode,
    ) -> Result<Option<PartnerRouting>, DurableLogError>;
}

#[async_trait::async_trait]
impl<T: DurableLog + ?Sized> DurableLog for Arc<T> {
    async fn insert_log_entry(&self, entry: &LogEntry) -> Result<(), DurableLogError> {
        (**self).insert_log_entry(entry).await
    }

    async fn find_partner_routing(
        &self,
        short_code: &str,
        routing_code: RoutingCode,
    ) -> Result<Option<PartnerRouting>, DurableLogError> {
        (**self).find_partner_routing(short_code, routing_code).await
    }
}
