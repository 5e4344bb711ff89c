//! Dispatch loop: scan → fetch → fan out → barrier, forever.
//!
//! Each iteration handles one scan page. Every fetched record gets its own
//! task in a per-batch `JoinSet`; the loop does not start the next page until
//! the whole set has been joined, so at most one page of records is in flight
//! and no two processors ever hold the same key at once.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::db::DurableLog;
use crate::external::NotificationSink;
use crate::redis::{RecordStore, RecordStoreError};

use super::record_processor::{ProcessOutcome, RecordProcessor};

/// Dispatch loop configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Scan page size hint.
    pub page_size: usize,
    /// Pause after a full keyspace pass and after a failed scan.
    pub wait_interval: Duration,
    /// Name for logging.
    pub name: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            wait_interval: Duration::from_secs(17),
            name: "transaction-worker".to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_wait_interval(mut self, wait_interval: Duration) -> Self {
        self.wait_interval = wait_interval;
        self
    }
}

/// Outcome counts of one joined batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub completed: usize,
    pub discarded: usize,
    pub retained: usize,
    /// Tasks that panicked. Their records stay in the store.
    pub aborted: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: ProcessOutcome) {
        match outcome {
            ProcessOutcome::Completed { .. } => self.completed += 1,
            ProcessOutcome::Discarded => self.discarded += 1,
            ProcessOutcome::Retained => self.retained += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.discarded + self.retained + self.aborted
    }
}

/// What one iteration of the loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationReport {
    /// The scan failed; the cursor was kept and the loop waited.
    ScanFailed,
    Batch {
        /// Processors launched (one per fetched key).
        launched: usize,
        /// Keys returned by the scan whose value could not be fetched.
        skipped: usize,
        summary: BatchSummary,
        /// True when the scan cursor wrapped to zero (full pass complete).
        pass_complete: bool,
    },
}

/// Cumulative loop statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub batches: u64,
    pub full_passes: u64,
    pub scan_errors: u64,
    pub keys_launched: u64,
    pub keys_skipped: u64,
    pub completed: u64,
    pub discarded: u64,
    pub retained: u64,
    pub aborted: u64,
}

impl DispatchStats {
    fn absorb(&mut self, launched: usize, skipped: usize, summary: &BatchSummary) {
        self.batches += 1;
        self.keys_launched += launched as u64;
        self.keys_skipped += skipped as u64;
        self.completed += summary.completed as u64;
        self.discarded += summary.discarded as u64;
        self.retained += summary.retained as u64;
        self.aborted += summary.aborted as u64;
    }
}

/// Long-running scan/dispatch driver.
///
/// Polls the record store for pending records and runs one
/// [`RecordProcessor`] per record, one scan page at a time.
pub struct DispatchLoop<S, L, N> {
    store: S,
    processor: Arc<RecordProcessor<S, L, N>>,
    pattern: String,
    config: DispatchConfig,
    cursor: u64,
    stats: DispatchStats,
}

impl<S, L, N> std::fmt::Debug for DispatchLoop<S, L, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchLoop")
            .field("pattern", &self.pattern)
            .field("config", &self.config)
            .field("cursor", &self.cursor)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<S, L, N> DispatchLoop<S, L, N>
where
    S: RecordStore + Clone + 'static,
    L: DurableLog + 'static,
    N: NotificationSink + 'static,
{
    /// Build a loop around `processor`, scanning with the same store handle
    /// and the processor's pending-record pattern. The cursor starts at zero.
    pub fn new(processor: RecordProcessor<S, L, N>, config: DispatchConfig) -> Self {
        let store = processor.store().clone();
        let pattern = processor.namespace().pending_pattern();
        Self {
            store,
            processor: Arc::new(processor),
            pattern,
            config,
            cursor: 0,
            stats: DispatchStats::default(),
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Run until the process exits.
    pub async fn run(mut self) {
        info!(
            worker = %self.config.name,
            pattern = %self.pattern,
            page_size = self.config.page_size,
            wait_interval = ?self.config.wait_interval,
            "transaction worker running"
        );

        loop {
            self.run_iteration().await;
        }
    }

    /// One scan page: fetch, launch, advance the cursor, wait for the batch.
    pub async fn run_iteration(&mut self) -> IterationReport {
        let wait = self.config.wait_interval;

        let page = match self
            .store
            .scan(self.cursor, &self.pattern, self.config.page_size)
            .await
        {
            Ok(page) => page,
            Err(err) => {
                self.stats.scan_errors += 1;
                error!(
                    worker = %self.config.name,
                    cursor = self.cursor,
                    error = %err,
                    retry_in = ?wait,
                    "scan failed; retrying from the same cursor"
                );
                tokio::time::sleep(wait).await;
                return IterationReport::ScanFailed;
            }
        };

        if !page.keys.is_empty() {
            info!(worker = %self.config.name, count = page.keys.len(), "found keys to process in this batch");
        }

        let mut batch = JoinSet::new();
        let mut skipped = 0;

        for (worker_id, key) in page.keys.into_iter().enumerate() {
            let raw = match self.store.get(&key).await {
                Ok(raw) => raw,
                Err(RecordStoreError::NotFound(_)) => {
                    info!(key = %key, "record vanished before fetch; skipping");
                    skipped += 1;
                    continue;
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "failed to fetch record; skipping");
                    skipped += 1;
                    continue;
                }
            };

            let processor = self.processor.clone();
            batch.spawn(async move { processor.process(worker_id, &key, &raw).await });
        }

        let launched = batch.len();

        self.cursor = page.next_cursor;
        let pass_complete = self.cursor == 0;
        if pass_complete {
            self.stats.full_passes += 1;
            debug!(worker = %self.config.name, pause = ?wait, "keyspace pass complete");
            tokio::time::sleep(wait).await;
        }

        let summary = join_batch(&mut batch).await;
        self.stats.absorb(launched, skipped, &summary);

        if launched > 0 || skipped > 0 {
            info!(
                worker = %self.config.name,
                launched,
                skipped,
                completed = summary.completed,
                discarded = summary.discarded,
                retained = summary.retained,
                aborted = summary.aborted,
                "batch finished"
            );
        }

        IterationReport::Batch {
            launched,
            skipped,
            summary,
            pass_complete,
        }
    }
}

/// Batch barrier: wait for every task in the set.
///
/// A panicking task surfaces as a join error and is counted, so the barrier
/// always releases.
async fn join_batch(batch: &mut JoinSet<ProcessOutcome>) -> BatchSummary {
    let mut summary = BatchSummary::default();

    while let Some(joined) = batch.join_next().await {
        match joined {
            Ok(outcome) => summary.record(outcome),
            Err(err) => {
                summary.aborted += 1;
                error!(error = %err, "record processor aborted");
            }
        }
    }

    summary
}
