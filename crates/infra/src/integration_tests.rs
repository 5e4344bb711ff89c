//! End-to-end tests for the dispatch pipeline.
//!
//! Tests: Scan → Fetch → RecordProcessor → DurableLog / Notification → Cleanup
//!
//! Verifies:
//! - Successful records are logged under fresh ids and removed from the store
//! - Undecodable records are removed without a log entry
//! - Failed log inserts leave the record for a later pass
//! - Scan and fetch failures never abort the loop or the batch
//! - The loop pauses only after a full pass or a failed scan

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use proptest::prelude::*;
    use txworker_core::{KeyNamespace, PartnerRouting, RoutingCode};

    use crate::db::InMemoryDurableLog;
    use crate::external::{NotifyError, RecordingNotificationSink};
    use crate::redis::InMemoryRecordStore;
    use crate::workers::{
        DispatchConfig, DispatchLoop, IterationReport, ProcessOutcome, RecordProcessor,
    };

    type TestLoop = DispatchLoop<
        Arc<InMemoryRecordStore>,
        Arc<InMemoryDurableLog>,
        Arc<RecordingNotificationSink>,
    >;

    struct Harness {
        store: Arc<InMemoryRecordStore>,
        log: Arc<InMemoryDurableLog>,
        sink: Arc<RecordingNotificationSink>,
        dispatch: TestLoop,
    }

    fn setup(page_size: usize) -> Harness {
        setup_with_wait(page_size, Duration::from_millis(1))
    }

    fn setup_with_wait(page_size: usize, wait: Duration) -> Harness {
        let store = Arc::new(InMemoryRecordStore::new());
        let log = Arc::new(InMemoryDurableLog::new());
        let sink = Arc::new(RecordingNotificationSink::new());

        let processor = RecordProcessor::new(
            store.clone(),
            log.clone(),
            sink.clone(),
            KeyNamespace::new("ns:").unwrap(),
        );
        let config = DispatchConfig::default()
            .with_name("test-worker")
            .with_page_size(page_size)
            .with_wait_interval(wait);

        Harness {
            store,
            log,
            sink,
            dispatch: DispatchLoop::new(processor, config),
        }
    }

    fn payload(tran_ref: &str) -> String {
        format!(
            r#"{{"code":"00","desc":"ok","msisdn":"0812345678","operator":"AIS","short-code":"1234","tran-ref":"{tran_ref}","timestamp":1700000000,"cyberus-return":"SUCCESS"}}"#
        )
    }

    /// Run iterations until the cursor wraps (one full keyspace pass).
    async fn run_pass(h: &mut Harness) -> Vec<IterationReport> {
        let mut reports = Vec::new();
        loop {
            let report = h.dispatch.run_iteration().await;
            let done = matches!(report, IterationReport::Batch { pass_complete: true, .. });
            reports.push(report);
            if done {
                return reports;
            }
        }
    }

    #[tokio::test]
    async fn routing_found_with_empty_url_logs_without_notifying() {
        let mut h = setup(100);
        h.log.add_routing(
            "1234",
            RoutingCode::AIS,
            PartnerRouting {
                id: 1,
                notification_url: String::new(),
                ..Default::default()
            },
        );
        h.store.insert("ns:callback-api:TX1", payload("TX1"));

        let report = h.dispatch.run_iteration().await;

        assert!(matches!(
            report,
            IterationReport::Batch { launched: 1, pass_complete: true, .. }
        ));
        assert!(h.sink.sent().is_empty());
        let rows = h.log.entries_for("TX1");
        assert_eq!(rows.len(), 1);
        assert_ne!(rows[0].id.to_string(), "TX1");
        assert!(!h.store.contains("ns:callback-api:TX1"));
    }

    #[tokio::test]
    async fn missing_routing_row_skips_notification() {
        let mut h = setup(100);
        h.store.insert("ns:callback-api:TX1", payload("TX1"));

        h.dispatch.run_iteration().await;

        assert!(h.sink.sent().is_empty());
        assert_eq!(h.log.entries_for("TX1").len(), 1);
        assert!(!h.store.contains("ns:callback-api:TX1"));
    }

    #[tokio::test]
    async fn malformed_record_is_deleted_without_log_entry() {
        let mut h = setup(100);
        h.store.insert("ns:callback-api:BAD", "{\"code\": oops");
        h.store.insert("ns:callback-api:TX1", payload("TX1"));

        let report = h.dispatch.run_iteration().await;

        let IterationReport::Batch { summary, .. } = report else {
            panic!("scan should not fail");
        };
        assert_eq!(summary.discarded, 1);
        assert_eq!(summary.completed, 1);
        assert!(!h.store.contains("ns:callback-api:BAD"));
        assert_eq!(h.log.entries().len(), 1);
        assert_eq!(h.log.entries()[0].tran_ref, "TX1");
    }

    #[tokio::test]
    async fn same_reference_in_two_batches_yields_two_rows() {
        let mut h = setup(100);

        h.store.insert("ns:callback-api:TX1", payload("TX1"));
        h.dispatch.run_iteration().await;

        // Producer re-publishes the same transaction later.
        h.store.insert("ns:callback-api:TX1", payload("TX1"));
        h.dispatch.run_iteration().await;

        let rows = h.log.entries_for("TX1");
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].id, rows[1].id);
        assert!(!h.store.contains("ns:callback-api:TX1"));
    }

    #[tokio::test]
    async fn failed_insert_is_retried_on_a_later_pass() {
        let mut h = setup(100);
        h.store.insert("ns:callback-api:TX1", payload("TX1"));
        h.log.set_fail_inserts(true);

        let report = h.dispatch.run_iteration().await;
        let IterationReport::Batch { summary, .. } = report else {
            panic!("scan should not fail");
        };
        assert_eq!(summary.retained, 1);
        assert!(h.store.contains("ns:callback-api:TX1"));
        assert!(h.log.entries().is_empty());

        h.log.set_fail_inserts(false);
        h.dispatch.run_iteration().await;

        assert_eq!(h.log.entries_for("TX1").len(), 1);
        assert!(!h.store.contains("ns:callback-api:TX1"));
        assert_eq!(h.dispatch.stats().retained, 1);
        assert_eq!(h.dispatch.stats().completed, 1);
    }

    #[tokio::test]
    async fn notification_failure_still_logs_and_deletes() {
        let mut h = setup(100);
        h.log.add_routing(
            "1234",
            RoutingCode::AIS,
            PartnerRouting {
                notification_url: "http://partner.invalid/dn".to_string(),
                ..Default::default()
            },
        );
        h.sink.fail_with(NotifyError::Status(502));
        h.store.insert("ns:callback-api:TX1", payload("TX1"));

        h.dispatch.run_iteration().await;

        assert_eq!(h.sink.sent().len(), 1);
        assert_eq!(h.log.entries_for("TX1").len(), 1);
        assert!(!h.store.contains("ns:callback-api:TX1"));
    }

    #[tokio::test]
    async fn scan_error_retries_from_the_same_cursor() {
        let mut h = setup(2);
        for i in 0..4 {
            h.store.insert(format!("ns:callback-api:TX{i}"), payload(&format!("TX{i}")));
        }

        h.dispatch.run_iteration().await;
        let cursor = h.dispatch.cursor();
        assert_ne!(cursor, 0);

        h.store.fail_next_scans(1);
        let report = h.dispatch.run_iteration().await;
        assert_eq!(report, IterationReport::ScanFailed);
        assert_eq!(h.dispatch.cursor(), cursor);

        h.dispatch.run_iteration().await;

        let cursors = h.store.scan_cursors();
        assert_eq!(&cursors[1..], &[cursor, cursor]);
        assert_eq!(h.dispatch.stats().scan_errors, 1);
        assert_eq!(h.log.entries().len(), 4);
    }

    #[tokio::test]
    async fn fetch_failure_skips_only_that_key() {
        let mut h = setup(100);
        h.store.insert("ns:callback-api:TX1", payload("TX1"));
        h.store.insert("ns:callback-api:TX2", payload("TX2"));
        h.store.insert("ns:callback-api:TX3", payload("TX3"));
        h.store.fail_get("ns:callback-api:TX2");
        h.store.vanish_after_scan("ns:callback-api:TX3");

        let report = h.dispatch.run_iteration().await;

        assert!(matches!(
            report,
            IterationReport::Batch { launched: 1, skipped: 2, .. }
        ));
        assert_eq!(h.log.entries_for("TX1").len(), 1);
        assert!(h.store.contains("ns:callback-api:TX2"));
        assert_eq!(h.dispatch.stats().keys_skipped, 2);
    }

    #[tokio::test]
    async fn paged_pass_processes_every_record_and_ignores_other_keys() {
        let mut h = setup(3);
        for i in 0..7 {
            h.store.insert(format!("ns:callback-api:TX{i}"), payload(&format!("TX{i}")));
        }
        h.store.insert("ns:log-worker:OLD", payload("OLD"));
        h.store.insert("other:callback-api:TX9", payload("TX9"));

        let reports = run_pass(&mut h).await;

        let launched: usize = reports
            .iter()
            .map(|r| match r {
                IterationReport::Batch { launched, .. } => *launched,
                IterationReport::ScanFailed => 0,
            })
            .sum();
        assert_eq!(launched, 7);
        assert!(reports.len() >= 3);
        assert_eq!(h.log.entries().len(), 7);
        assert!(h.store.contains("ns:log-worker:OLD"));
        assert!(h.store.contains("other:callback-api:TX9"));
        assert!(h.store.contains("ns:log-worker:TX6"));
        assert_eq!(h.dispatch.stats().full_passes, 1);
        assert_eq!(h.dispatch.cursor(), 0);
    }

    #[tokio::test]
    async fn batch_is_settled_when_the_iteration_returns() {
        let mut h = setup(50);
        for i in 0..50 {
            h.store.insert(format!("ns:callback-api:TX{i}"), payload(&format!("TX{i}")));
        }

        let report = h.dispatch.run_iteration().await;

        let IterationReport::Batch { launched, summary, .. } = report else {
            panic!("scan should not fail");
        };
        assert_eq!(launched, 50);
        assert_eq!(summary.total(), 50);
        assert_eq!(summary.completed, 50);
        assert_eq!(h.log.entries().len(), 50);
        assert!(h.store.keys().iter().all(|k| k.starts_with("ns:log-worker:")));
    }

    #[tokio::test]
    async fn empty_keyspace_completes_a_pass() {
        let mut h = setup(100);

        let report = h.dispatch.run_iteration().await;

        assert_eq!(
            report,
            IterationReport::Batch {
                launched: 0,
                skipped: 0,
                summary: Default::default(),
                pass_complete: true,
            }
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn undecodable_values_are_always_discarded(raw in "[^{]*") {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let store = Arc::new(InMemoryRecordStore::new());
            let log = Arc::new(InMemoryDurableLog::new());
            let processor = RecordProcessor::new(
                store.clone(),
                log.clone(),
                Arc::new(RecordingNotificationSink::new()),
                KeyNamespace::new("ns:").unwrap(),
            );
            store.insert("ns:callback-api:P", &raw);

            let outcome = rt.block_on(processor.process(0, "ns:callback-api:P", &raw));

            prop_assert_eq!(outcome, ProcessOutcome::Discarded);
            prop_assert!(!store.contains("ns:callback-api:P"));
            prop_assert!(log.entries().is_empty());
        }
    }

    const PACING_WAIT: Duration = Duration::from_secs(17);

    #[tokio::test(start_paused = true)]
    async fn mid_pass_page_does_not_pause() {
        let mut h = setup_with_wait(2, PACING_WAIT);
        for tran_ref in ["TX1", "TX2", "TX3"] {
            h.store.insert(format!("ns:callback-api:{tran_ref}"), payload(tran_ref));
        }

        let started = tokio::time::Instant::now();
        let report = h.dispatch.run_iteration().await;

        assert!(matches!(
            report,
            IterationReport::Batch { launched: 2, pass_complete: false, .. }
        ));
        assert!(started.elapsed() < PACING_WAIT);
    }

    #[tokio::test(start_paused = true)]
    async fn final_page_pauses_once() {
        let mut h = setup_with_wait(100, PACING_WAIT);
        h.store.insert("ns:callback-api:TX1", payload("TX1"));

        let started = tokio::time::Instant::now();
        let report = h.dispatch.run_iteration().await;

        assert!(matches!(
            report,
            IterationReport::Batch { launched: 1, pass_complete: true, .. }
        ));
        let elapsed = started.elapsed();
        assert!(elapsed >= PACING_WAIT, "paused for {elapsed:?}");
        assert!(elapsed < PACING_WAIT * 2, "paused for {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_keyspace_pauses_once() {
        let mut h = setup_with_wait(100, PACING_WAIT);

        let started = tokio::time::Instant::now();
        h.dispatch.run_iteration().await;

        let elapsed = started.elapsed();
        assert!(elapsed >= PACING_WAIT && elapsed < PACING_WAIT * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_scan_pauses_once() {
        let mut h = setup_with_wait(100, PACING_WAIT);
        h.store.insert("ns:callback-api:TX1", payload("TX1"));
        h.store.fail_next_scans(1);

        let started = tokio::time::Instant::now();
        let report = h.dispatch.run_iteration().await;

        assert_eq!(report, IterationReport::ScanFailed);
        let elapsed = started.elapsed();
        assert!(elapsed >= PACING_WAIT, "paused for {elapsed:?}");
        assert!(elapsed < PACING_WAIT * 2, "paused for {elapsed:?}");
        assert!(h.store.contains("ns:callback-api:TX1"));
    }
}
