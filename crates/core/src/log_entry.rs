//! Durable log entry written once per processed payload.

use serde::{Deserialize, Serialize};

use crate::id::LogEntryId;
use crate::payload::TransactionPayload;

/// One append-only row of the transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: LogEntryId,
    pub code: String,
    pub description: String,
    pub subscriber_id: String,
    pub operator: String,
    pub short_code: String,
    pub tran_ref: String,
    pub timestamp: i64,
    pub return_status: String,
}

impl LogEntry {
    /// Build an entry with a freshly generated id.
    pub fn from_payload(payload: &TransactionPayload) -> Self {
        Self {
            id: LogEntryId::new(),
            code: payload.code.clone(),
            description: payload.description.clone(),
            subscriber_id: payload.subscriber_id.clone(),
            operator: payload.operator.clone(),
            short_code: payload.short_code.clone(),
            tran_ref: payload.tran_ref.clone(),
            timestamp: payload.timestamp,
            return_status: payload.return_status.clone(),
        }
    }
}
