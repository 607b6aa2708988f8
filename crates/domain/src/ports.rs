//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{
    Author, FeedPost, FeedUser, FollowingEntry, IngestRun, Page, Post, PostWithAuthor, RunOutcome,
    RunProgress, User, UserId,
};

/// Error type for feed API operations
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Rate limited (HTTP 429), retry after: {0:?}")]
    RateLimited(Option<std::time::Duration>),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl FeedError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FeedError::RateLimited(_))
    }
}

/// Port for reading the social feed API
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch one page of the accounts `handle` follows
    async fn fetch_following(
        &self,
        handle: &str,
        cursor: Option<&str>,
    ) -> Result<Page<FeedUser>, FeedError>;

    /// Fetch one page of `handle`'s most recent posts, newest first
    async fn fetch_posts(
        &self,
        handle: &str,
        cursor: Option<&str>,
    ) -> Result<Page<FeedPost>, FeedError>;

    /// Fetch a single account profile
    async fn fetch_profile(&self, handle: &str) -> Result<FeedUser, FeedError>;
}

/// Error type for media enrichment operations
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} exceeds limit")]
    ExceedsLimit(String),
    #[error("video transcription not yet implemented")]
    NotImplemented,
    #[error("API error: {0}")]
    Api(String),
    #[error("Network error: {0}")]
    Network(String),
}

/// Port for describing attached media as text
#[async_trait]
pub trait MediaDescriber: Send + Sync {
    /// Describe images; images that fail are dropped from the result
    async fn describe_images(&self, urls: &[String]) -> Result<Vec<String>, MediaError>;

    /// Transcribe a video's audio track
    async fn transcribe_video(
        &self,
        url: &str,
        duration_secs: u64,
        size_bytes: u64,
    ) -> Result<String, MediaError>;
}

/// Error type for storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Run {run_id} is already active for user {user_id}")]
    RunAlreadyActive { user_id: UserId, run_id: String },
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Port for local user accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn get_user_by_handle(&self, handle: &str) -> Result<Option<User>, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
}

/// Port for the persistent record of ingest attempts
#[async_trait]
pub trait RunLedger: Send + Sync {
    /// Insert a new run; fails with `RunAlreadyActive` if the user already
    /// has a run without a completion time
    async fn create_run(&self, run: &IngestRun) -> Result<(), StoreError>;

    /// The run for `user_id` that has no completion time, if any
    async fn current_run(&self, user_id: UserId) -> Result<Option<IngestRun>, StoreError>;

    /// Most recent completed runs, newest first
    async fn recent_runs(&self, user_id: UserId, limit: u32)
    -> Result<Vec<IngestRun>, StoreError>;

    /// Completion time of the most recently completed run
    async fn last_sync_at(&self, user_id: UserId) -> Result<Option<OffsetDateTime>, StoreError>;

    /// Checkpoint counters of an active run
    async fn update_progress(&self, run_id: &str, progress: &RunProgress)
    -> Result<(), StoreError>;

    /// Set the terminal status; a run is finalized at most once
    async fn finalize_run(&self, run_id: &str, outcome: &RunOutcome) -> Result<(), StoreError>;

    /// Finalize runs still active that started before `started_before`,
    /// returning how many were closed
    async fn reconcile_stale_runs(
        &self,
        started_before: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<u64, StoreError>;
}

/// Port for the global author registry
#[async_trait]
pub trait AuthorStore: Send + Sync {
    /// Insert or update handle and display name (last write wins).
    /// An absent `last_seen_at` leaves the stored value untouched.
    async fn upsert_author(&self, author: &Author) -> Result<(), StoreError>;

    async fn get_author(&self, id: i64) -> Result<Option<Author>, StoreError>;

    /// Advance the last-seen timestamp; it never moves backwards
    async fn update_last_seen(&self, id: i64, seen_at: OffsetDateTime) -> Result<(), StoreError>;
}

/// Port for per-user follow relationships
#[async_trait]
pub trait FollowStore: Send + Sync {
    /// Insert or refresh a relationship. New relationships are refused once
    /// the user already has `limit` of them; returns whether the row is stored.
    async fn upsert_following(
        &self,
        user_id: UserId,
        author_id: i64,
        checked_at: OffsetDateTime,
        limit: usize,
    ) -> Result<bool, StoreError>;

    /// Followed authors in storage order
    async fn following(&self, user_id: UserId) -> Result<Vec<FollowingEntry>, StoreError>;

    async fn following_count(&self, user_id: UserId) -> Result<usize, StoreError>;
}

/// Port for per-user ingested posts
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn post_exists(&self, user_id: UserId, post_id: i64) -> Result<bool, StoreError>;

    /// Insert a post; a duplicate (user, post) pair is a `Conflict`
    async fn insert_post(&self, post: &Post) -> Result<(), StoreError>;

    /// Posts published within `[from, to]`, oldest first
    async fn posts_in_range(
        &self,
        user_id: UserId,
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<PostWithAuthor>, StoreError>;
}

/// Everything the ingestion pipeline persists through
pub trait IngestStore: UserStore + RunLedger + AuthorStore + FollowStore + PostStore {}

impl<T> IngestStore for T where T: UserStore + RunLedger + AuthorStore + FollowStore + PostStore {}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
