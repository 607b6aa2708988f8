//! Ingest status reporting

use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    model::{IngestRun, RunStatus, UserId},
    ports::{RunLedger, StoreError},
};

pub const DEFAULT_STATUS_LIMIT: u32 = 10;
pub const MAX_STATUS_LIMIT: u32 = 50;

/// Summary state derived from the ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    NeverRun,
    Running {
        run_id: String,
        #[serde(with = "time::serde::rfc3339")]
        started_at: OffsetDateTime,
    },
    Completed {
        status: RunStatus,
        error: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestStatus {
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_sync_at: Option<OffsetDateTime>,
    pub current_run: Option<IngestRun>,
    pub recent_runs: Vec<IngestRun>,
    pub sync_state: SyncState,
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("Limit must be between 1 and 50, got {0}")]
    InvalidLimit(u32),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Read a user's sync state and recent run history
pub async fn ingest_status<L>(
    ledger: &L,
    user_id: UserId,
    limit: Option<u32>,
) -> Result<IngestStatus, StatusError>
where
    L: RunLedger + ?Sized,
{
    let limit = limit.unwrap_or(DEFAULT_STATUS_LIMIT);
    if !(1..=MAX_STATUS_LIMIT).contains(&limit) {
        return Err(StatusError::InvalidLimit(limit));
    }

    let last_sync_at = ledger.last_sync_at(user_id).await?;
    let current_run = ledger.current_run(user_id).await?;
    let recent_runs = ledger.recent_runs(user_id, limit).await?;

    let sync_state = match (&current_run, recent_runs.first()) {
        (Some(run), _) => SyncState::Running {
            run_id: run.id.clone(),
            started_at: run.started_at,
        },
        (None, Some(last)) => SyncState::Completed {
            status: last.status,
            error: last.err_text.clone(),
        },
        (None, None) => SyncState::NeverRun,
    };

    Ok(IngestStatus {
        last_sync_at,
        current_run,
        recent_runs,
        sync_state,
    })
}
