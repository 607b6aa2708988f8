//! Status command - sync state and recent run history

use anyhow::Result;
use askfeed_domain::{
    IngestRun,
    usecases::{SyncState, ingest_status},
};
use std::path::PathBuf;

use crate::args::StatusArgs;
use crate::commands::{format_time, open_store, resolve_user};
use crate::config::AppConfig;

pub async fn execute(args: StatusArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let store = open_store(&config).await?;
    let user = resolve_user(&store, &args.user).await?;

    let status = ingest_status(store.as_ref(), user.id, args.limit).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Sync status for @{} ({})", user.handle, user.id);

    match &status.sync_state {
        SyncState::NeverRun => println!("  State: never run"),
        SyncState::Running { run_id, started_at } => println!(
            "  State: running (run {}, started {})",
            run_id,
            format_time(*started_at)
        ),
        SyncState::Completed { status, error } => match error {
            Some(error) => println!("  State: {} ({})", status, error),
            None => println!("  State: {}", status),
        },
    }

    match status.last_sync_at {
        Some(ts) => println!("  Last sync: {}", format_time(ts)),
        None => println!("  Last sync: never"),
    }

    if !status.recent_runs.is_empty() {
        println!();
        println!("Recent runs:");
        for run in &status.recent_runs {
            print_run(run);
        }
    }

    Ok(())
}

fn print_run(run: &IngestRun) {
    let completed = run
        .completed_at
        .map(format_time)
        .unwrap_or_else(|| "-".to_string());

    println!(
        "  {}  {:<12}  started {}  completed {}  fetched {}  retried {}  429s {}",
        run.id,
        run.status.as_str(),
        format_time(run.started_at),
        completed,
        run.fetched_count,
        run.retried,
        run.rate_limit_hits
    );

    if let Some(err) = &run.err_text {
        println!("      error: {}", err);
    }
}
