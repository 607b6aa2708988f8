//! Fire-and-forget ingest triggering

use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::{
    model::UserId,
    ports::{Clock, FeedSource, IngestStore},
    usecases::ingest::{IngestError, IngestSummary, Ingestor, backfill_window},
};

/// Immediate answer to a trigger request
#[derive(Debug)]
pub enum TriggerOutcome {
    /// A run was dispatched in the background
    Accepted {
        handle: JoinHandle<Result<IngestSummary, IngestError>>,
    },
    /// Another run is still active for the user
    Conflict {
        run_id: String,
        started_at: OffsetDateTime,
    },
}

impl<F, S, C> Ingestor<F, S, C>
where
    F: FeedSource + ?Sized + 'static,
    S: IngestStore + ?Sized + 'static,
    C: Clock + ?Sized + 'static,
{
    /// Validate and dispatch a run without waiting for it.
    ///
    /// The returned handle may be dropped; the run continues and its outcome
    /// is recorded in the ledger.
    pub async fn trigger(
        &self,
        user_id: UserId,
        backfill_hours: u32,
    ) -> Result<TriggerOutcome, IngestError> {
        let window = backfill_window(backfill_hours)?;

        if let Some(active) = self.store().current_run(user_id).await? {
            tracing::info!(
                user_id = %user_id,
                run_id = %active.id,
                "Ingest already in progress"
            );
            return Ok(TriggerOutcome::Conflict {
                run_id: active.id,
                started_at: active.started_at,
            });
        }

        if self.store().get_user(user_id).await?.is_none() {
            return Err(IngestError::UserNotFound(user_id));
        }

        let ingestor = self.clone();
        let handle = tokio::spawn(async move {
            ingestor.ingest_user_data(user_id, window).await
        });

        tracing::info!(user_id = %user_id, backfill_hours, "Ingest accepted");
        Ok(TriggerOutcome::Accepted { handle })
    }
}
