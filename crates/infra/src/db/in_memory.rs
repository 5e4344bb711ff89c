use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use txworker_core::{LogEntry, PartnerRouting, RoutingCode};

use super::durable_log::{DurableLog, DurableLogError};

/// In-memory durable log.
///
/// Intended for tests/dev. Inserts and lookups can be made to fail on demand.
#[derive(Debug, Default)]
pub struct InMemoryDurableLog {
    entries: RwLock<Vec<LogEntry>>,
    routing: RwLock<HashMap<(String, &'static str), PartnerRouting>>,
    fail_inserts: AtomicBool,
    fail_lookups: AtomicBool,
}

impl InMemoryDurableLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_routing(
        &self,
        short_code: impl Into<String>,
        routing_code: RoutingCode,
        routing: PartnerRouting,
    ) {
        if let Ok(mut rows) = self.routing.write() {
            rows.insert((short_code.into(), routing_code.as_str()), routing);
        }
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of inserted rows, in insertion order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn entries_for(&self, tran_ref: &str) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.tran_ref == tran_ref)
            .collect()
    }
}

#[async_trait::async_trait]
impl DurableLog for InMemoryDurableLog {
    async fn insert_log_entry(&self, entry: &LogEntry) -> Result<(), DurableLogError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(DurableLogError::Insert(
                "injected insert failure".to_string(),
            ));
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|_| DurableLogError::Insert("lock poisoned".to_string()))?;

        // Primary key constraint.
        if entries.iter().any(|e| e.id == entry.id) {
            return Err(DurableLogError::Insert(format!(
                "duplicate key value violates unique constraint: {}",
                entry.id
            )));
        }

        entries.push(entry.clone());
        Ok(())
    }

    async fn find_partner_routing(
        &self,
        short_code: &str,
        routing_code: RoutingCode,
    ) -> Result<Option<PartnerRouting>, DurableLogError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(DurableLogError::Query(
                "injected lookup failure".to_string(),
            ));
        }

        let rows = self
            .routing
            .read()
            .map_err(|_| DurableLogError::Query("lock poisoned".to_string()))?;

        Ok(rows
            .get(&(short_code.to_string(), routing_code.as_str()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txworker_core::TransactionPayload;

    #[tokio::test]
    async fn rejects_duplicate_primary_key() {
        let log = InMemoryDurableLog::new();
        let entry = LogEntry::from_payload(&TransactionPayload::default());
        log.insert_log_entry(&entry).await.unwrap();
        let err = log.insert_log_entry(&entry).await.unwrap_err();
        assert!(matches!(err, DurableLogError::Insert(_)));
        assert_eq!(log.entries().len(), 1);
    }

    #[tokio::test]
    async fn routing_lookup_is_keyed_by_short_code_and_code() {
        let log = InMemoryDurableLog::new();
        log.add_routing(
            "1234",
            RoutingCode::AIS,
            PartnerRouting {
                id: 1,
                notification_url: "http://partner/dn".to_string(),
                ..Default::default()
            },
        );

        let hit = log.find_partner_routing("1234", RoutingCode::AIS).await.unwrap();
        assert_eq!(hit.map(|r| r.id), Some(1));

        let miss = log.find_partner_routing("1234", RoutingCode::DTAC).await.unwrap();
        assert!(miss.is_none());
    }
}
