use anyhow::Context;

use txworker_infra::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    txworker_observability::init();

    let config = WorkerConfig::from_env().context("invalid configuration")?;

    let worker = txworker_daemon::build_worker(&config).await?;

    tracing::info!(
        pattern = %worker.pattern(),
        "application started; background worker is running"
    );

    tokio::select! {
        _ = worker.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            tracing::info!("shutdown signal received; exiting");
        }
    }

    Ok(())
}
