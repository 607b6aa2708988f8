//! Schedule command - periodic sync of every registered user

use anyhow::{Context, Result};
use askfeed_domain::{
    RunLedger, UserStore,
    usecases::{IngestError, backfill_window},
};
use std::path::PathBuf;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::{MissedTickBehavior, interval};

use crate::args::ScheduleArgs;
use crate::commands::{AppIngestor, build_ingestor, open_store};
use crate::config::AppConfig;

pub async fn execute(args: ScheduleArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let store = open_store(&config).await?;
    let window = backfill_window(config.schedule.backfill_hours)?;

    let stale_after = time::Duration::seconds(
        i64::try_from(config.ingest.stale_run_after_secs).context("stale_run_after_secs too large")?,
    );
    let now = OffsetDateTime::now_utc();
    let swept = store
        .reconcile_stale_runs(now - stale_after, now)
        .await
        .context("Failed to close abandoned runs")?;
    if swept > 0 {
        tracing::warn!(runs = swept, "Closed abandoned ingest runs");
    }

    let ingestor = build_ingestor(&config, store)?;

    tracing::info!(
        once = args.once,
        interval_secs = config.schedule.interval_secs,
        backfill_hours = config.schedule.backfill_hours,
        "Starting askfeed schedule"
    );

    if args.once {
        sync_all(&ingestor, window).await?;
        tracing::info!("askfeed schedule completed");
        return Ok(());
    }

    let mut ticker = interval(Duration::from_secs(config.schedule.interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sync_all(&ingestor, window).await {
                    tracing::error!(error = %e, "Sync cycle failed");
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down gracefully");
                break;
            }
        }
    }

    tracing::info!("askfeed schedule completed");
    Ok(())
}

/// One pass over all users; a failed user does not stop the pass
async fn sync_all(ingestor: &AppIngestor, window: Duration) -> Result<()> {
    let users = ingestor.store().list_users().await?;
    let mut synced = 0usize;

    for user in users {
        match ingestor.ingest_user_data(user.id, window).await {
            Ok(summary) => {
                synced += 1;
                tracing::info!(
                    user_id = %user.id,
                    run_id = %summary.run_id,
                    fetched = summary.fetched,
                    "User synced"
                );
            }
            Err(IngestError::AlreadyRunning { run_id, .. }) => {
                tracing::info!(user_id = %user.id, run_id = %run_id, "Sync already running, skipping");
            }
            Err(e) => {
                tracing::error!(user_id = %user.id, handle = %user.handle, error = %e, "Sync failed");
            }
        }
    }

    tracing::info!(synced, "Sync cycle complete");
    Ok(())
}
