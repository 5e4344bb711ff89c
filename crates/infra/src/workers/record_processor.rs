//! Record processor: the unit of work run once per fetched pending record.
//!
//! Linear sequence, every early return is terminal for that record:
//!
//! 1. decode the payload (undecodable → delete the key, done)
//! 2. resolve partner routing and, if a URL is configured, notify (best effort)
//! 3. insert the log entry (failure → leave the key for the next scan, done)
//! 4. write the confirmation marker (best effort)
//! 5. delete the pending key
//!
//! A failed insert is the only retry mechanism: the record simply stays in
//! the store and is picked up again by a later scan. There is no attempt
//! counter, so a permanently failing insert is retried on every pass.

use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use txworker_core::{
    KeyNamespace, LogEntry, LogEntryId, NotificationParams, TransactionPayload,
};

use crate::config::MARKER_TTL;
use crate::db::DurableLog;
use crate::external::NotificationSink;
use crate::redis::RecordStore;

/// Terminal state of one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Log entry written; the pending key was (or will be, if the delete
    /// failed) removed.
    Completed { log_id: LogEntryId },
    /// Undecodable payload; the pending key was removed without logging.
    Discarded,
    /// Log insert failed; the pending key was left for a later scan.
    Retained,
}

pub struct RecordProcessor<S, L, N> {
    store: S,
    log: L,
    sink: N,
    namespace: KeyNamespace,
    marker_ttl: Duration,
}

impl<S, L, N> std::fmt::Debug for RecordProcessor<S, L, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordProcessor")
            .field("namespace", &self.namespace)
            .field("marker_ttl", &self.marker_ttl)
            .finish_non_exhaustive()
    }
}

impl<S, L, N> RecordProcessor<S, L, N>
where
    S: RecordStore,
    L: DurableLog,
    N: NotificationSink,
{
    pub fn new(store: S, log: L, sink: N, namespace: KeyNamespace) -> Self {
        Self {
            store,
            log,
            sink,
            namespace,
            marker_ttl: MARKER_TTL,
        }
    }

    pub fn with_marker_ttl(mut self, ttl: Duration) -> Self {
        self.marker_ttl = ttl;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    /// Process one record fetched from `key`.
    ///
    /// Never fails: every error is logged and folded into the outcome.
    #[instrument(skip(self, worker_id, key, raw), fields(worker = worker_id, key = %key))]
    pub async fn process(&self, worker_id: usize, key: &str, raw: &str) -> ProcessOutcome {
        debug!("processing record");

        let payload = match TransactionPayload::decode(raw) {
            Ok(p) => p,
            Err(err) => {
                error!(error = %err, "undecodable payload; discarding record");
                if let Err(err) = self.store.delete(key).await {
                    warn!(error = %err, "failed to delete undecodable record");
                }
                return ProcessOutcome::Discarded;
            }
        };

        self.notify_partner(&payload).await;

        let entry = LogEntry::from_payload(&payload);
        if let Err(err) = self.log.insert_log_entry(&entry).await {
            error!(
                tran_ref = %payload.tran_ref,
                error = %err,
                "log insert failed; record left for retry"
            );
            return ProcessOutcome::Retained;
        }

        let marker_key = self.namespace.marker_key(&payload.tran_ref);
        if let Err(err) = self
            .store
            .set_with_expiry(&marker_key, raw, self.marker_ttl)
            .await
        {
            warn!(marker = %marker_key, error = %err, "failed to write confirmation marker");
        }

        if let Err(err) = self.store.delete(key).await {
            warn!(error = %err, "failed to delete processed record; it will be reprocessed");
        }

        info!(tran_ref = %payload.tran_ref, log_id = %entry.id, "record processed");
        ProcessOutcome::Completed { log_id: entry.id }
    }

    /// Resolve partner routing and send the delivery notification if one is
    /// configured. Nothing here affects the outcome of the record.
    async fn notify_partner(&self, payload: &TransactionPayload) {
        let routing_code = payload.operator().routing_code();

        let routing = match self
            .log
            .find_partner_routing(&payload.short_code, routing_code)
            .await
        {
            Ok(Some(routing)) => routing,
            Ok(None) => {
                info!(
                    short_code = %payload.short_code,
                    routing_code = %routing_code,
                    "no partner routing; skipping notification"
                );
                return;
            }
            Err(err) => {
                warn!(error = %err, "partner routing lookup failed; skipping notification");
                return;
            }
        };

        let Some(url) = routing.notification_target() else {
            debug!(partner = routing.id, "partner has no notification url");
            return;
        };

        let params = NotificationParams::from_payload(payload);
        match self.sink.notify(url, &params).await {
            Ok(()) => info!(partner = routing.id, "partner notified"),
            Err(err) => warn!(partner = routing.id, error = %err, "partner notification failed"),
        }
    }
}
