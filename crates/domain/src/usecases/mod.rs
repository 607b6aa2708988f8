//! Application use cases / business logic

pub mod ingest;
pub mod retry;
pub mod status;
pub mod trigger;

pub use ingest::{
    IngestConfig, IngestError, IngestSummary, Ingestor, MAX_BACKFILL_HOURS, backfill_window,
};
pub use retry::{RetryPolicy, RetryStats};
pub use status::{
    DEFAULT_STATUS_LIMIT, IngestStatus, MAX_STATUS_LIMIT, StatusError, SyncState, ingest_status,
};
pub use trigger::TriggerOutcome;
