//! Ingest command - run one ingestion for a user

use anyhow::{Context, Result, bail};
use askfeed_domain::usecases::TriggerOutcome;
use std::path::PathBuf;

use crate::args::IngestArgs;
use crate::commands::{build_ingestor, format_time, open_store, resolve_user};
use crate::config::AppConfig;

pub async fn execute(args: IngestArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let store = open_store(&config).await?;
    let user = resolve_user(&store, &args.user).await?;
    let ingestor = build_ingestor(&config, store)?;

    let backfill_hours = args
        .backfill_hours
        .unwrap_or(config.ingest.default_backfill_hours);

    tracing::info!(
        user_id = %user.id,
        handle = %user.handle,
        backfill_hours,
        "Starting ingest"
    );

    let handle = match ingestor.trigger(user.id, backfill_hours).await? {
        TriggerOutcome::Accepted { handle } => handle,
        TriggerOutcome::Conflict { run_id, started_at } => {
            bail!(
                "Ingest already in progress for @{} (run {}, started {})",
                user.handle,
                run_id,
                format_time(started_at)
            );
        }
    };

    let summary = handle
        .await
        .context("Ingest task panicked")?
        .with_context(|| format!("Ingest failed for @{}", user.handle))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Run {} completed for @{}", summary.run_id, user.handle);
        println!("  Following refreshed: {}", summary.following_refreshed);
        println!("  Authors processed:   {}", summary.authors_processed);
        println!("  Posts stored:        {}", summary.fetched);
        println!(
            "  Retries:             {} ({} rate limited responses)",
            summary.retried, summary.rate_limit_hits
        );
    }

    Ok(())
}
