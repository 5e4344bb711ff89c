//! Daemon wiring: configuration → connection pools → dispatch loop.

use anyhow::Context;

use txworker_infra::WorkerConfig;
use txworker_infra::db::PostgresDurableLog;
use txworker_infra::external::HttpNotificationSink;
use txworker_infra::redis::RedisRecordStore;
use txworker_infra::workers::{DispatchLoop, RecordProcessor};

/// Concrete loop type used by the daemon.
pub type TransactionWorker = DispatchLoop<RedisRecordStore, PostgresDurableLog, HttpNotificationSink>;

/// Connect to every collaborator and assemble the worker.
///
/// Any failure here is a startup failure; nothing is retried.
pub async fn build_worker(config: &WorkerConfig) -> anyhow::Result<TransactionWorker> {
    let store = RedisRecordStore::connect(&config.redis_url)
        .await
        .context("failed to connect to the record store")?;

    let log = PostgresDurableLog::connect(&config.database_url, &config.db_pool)
        .await
        .context("failed to connect to the database")?;

    let sink = HttpNotificationSink::new(config.notify_timeout)
        .context("failed to build the notification client")?;

    let processor = RecordProcessor::new(store, log, sink, config.namespace.clone())
        .with_marker_ttl(config.marker_ttl);

    Ok(DispatchLoop::new(processor, config.dispatch.clone()))
}
