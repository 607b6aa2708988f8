//! Ingestion use case - refreshes the following set and backfills posts per user

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::time::{Duration, sleep};

use crate::{
    model::{Author, FeedPost, FollowingEntry, IngestRun, Post, RunOutcome, RunProgress, RunStatus, User, UserId},
    policy::{SyncMode, append_media_descriptions, is_original_post, parse_post_timestamp},
    ports::{Clock, FeedError, FeedSource, IngestStore, MediaDescriber, StoreError},
    usecases::retry::{RetryPolicy, RetryStats},
};

/// Upper bound on a triggered backfill window, in hours
pub const MAX_BACKFILL_HOURS: u32 = 720;

/// Configuration for ingestion runs
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Maximum follow relationships kept per user
    pub following_limit: usize,
    /// Backoff around rate-limited feed calls
    pub retry: RetryPolicy,
    /// Pause between pages of one listing
    pub page_delay: Duration,
    /// Pause between authors in the backfill phase
    pub author_delay: Duration,
    /// Media items sent for enrichment per run
    pub max_media_per_run: usize,
    /// Photos sent for description per post
    pub max_images_per_post: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            following_limit: 150,
            retry: RetryPolicy::default(),
            page_delay: Duration::from_millis(100),
            author_delay: Duration::from_millis(200),
            max_media_per_run: 200,
            max_images_per_post: 4,
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub run_id: String,
    pub following_refreshed: usize,
    pub authors_processed: usize,
    pub fetched: u32,
    pub retried: u32,
    pub rate_limit_hits: u32,
}

/// Errors from an ingestion run
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Ingest run {run_id} already in progress")]
    AlreadyRunning {
        run_id: String,
        started_at: OffsetDateTime,
    },
    #[error("User {0} not found")]
    UserNotFound(UserId),
    #[error("Backfill window of {hours} hours exceeds the maximum of {max}")]
    InvalidBackfill { hours: u32, max: u32 },
    #[error("Failed to {context}: {source}")]
    Feed {
        context: String,
        #[source]
        source: FeedError,
    },
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Terminal status recorded for a run that failed with this error
    pub fn run_status(&self) -> RunStatus {
        match self {
            IngestError::Feed { source, .. } if source.is_rate_limited() => RunStatus::RateLimited,
            _ => RunStatus::Error,
        }
    }

    fn feed(context: impl Into<String>, source: FeedError) -> Self {
        IngestError::Feed {
            context: context.into(),
            source,
        }
    }
}

/// Mutable counters for one run
#[derive(Debug, Default)]
struct RunState {
    cursor: i64,
    fetched: u32,
    stats: RetryStats,
    media_used: usize,
    following_refreshed: usize,
}

impl RunState {
    fn progress(&self) -> RunProgress {
        RunProgress {
            cursor: self.cursor,
            fetched: self.fetched,
            retried: self.stats.retried,
            rate_limit_hits: self.stats.rate_limit_hits,
        }
    }
}

/// Ingestion orchestrator
pub struct Ingestor<F, S, C>
where
    F: FeedSource + ?Sized,
    S: IngestStore + ?Sized,
    C: Clock + ?Sized,
{
    feed: Arc<F>,
    store: Arc<S>,
    media: Option<Arc<dyn MediaDescriber>>,
    clock: Arc<C>,
    config: IngestConfig,
}

impl<F, S, C> Clone for Ingestor<F, S, C>
where
    F: FeedSource + ?Sized,
    S: IngestStore + ?Sized,
    C: Clock + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            feed: Arc::clone(&self.feed),
            store: Arc::clone(&self.store),
            media: self.media.clone(),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<F, S, C> Ingestor<F, S, C>
where
    F: FeedSource + ?Sized,
    S: IngestStore + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(feed: Arc<F>, store: Arc<S>, clock: Arc<C>, config: IngestConfig) -> Self {
        Self {
            feed,
            store,
            media: None,
            clock,
            config,
        }
    }

    /// Enable media enrichment
    pub fn with_media(mut self, media: Arc<dyn MediaDescriber>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run a full ingestion for one user.
    ///
    /// A zero `window` refreshes the first page of each author; a non-zero
    /// window paginates back to `now - window`.
    pub async fn ingest_user_data(
        &self,
        user_id: UserId,
        window: Duration,
    ) -> Result<IngestSummary, IngestError> {
        if let Some(active) = self.store.current_run(user_id).await? {
            return Err(IngestError::AlreadyRunning {
                run_id: active.id,
                started_at: active.started_at,
            });
        }

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(IngestError::UserNotFound(user_id))?;

        let run = IngestRun::start(user_id, self.clock.now());
        if let Err(e) = self.store.create_run(&run).await {
            return Err(match e {
                StoreError::RunAlreadyActive { run_id, .. } => {
                    let started_at = self
                        .store
                        .current_run(user_id)
                        .await?
                        .map(|r| r.started_at)
                        .unwrap_or(run.started_at);
                    IngestError::AlreadyRunning { run_id, started_at }
                }
                other => other.into(),
            });
        }

        let mode = SyncMode::from_window(run.started_at, window);

        tracing::info!(
            user_id = %user_id,
            run_id = %run.id,
            handle = %user.handle,
            backfill = mode.is_backfill(),
            window_secs = window.as_secs(),
            "Starting ingest run"
        );

        let mut state = RunState::default();
        let result = self.execute(&user, &run.id, mode, &mut state).await;
        let progress = state.progress();

        match result {
            Ok(authors_processed) => {
                let outcome = RunOutcome {
                    status: RunStatus::Ok,
                    progress,
                    err_text: None,
                    completed_at: self.clock.now(),
                };
                self.store.finalize_run(&run.id, &outcome).await?;

                tracing::info!(
                    user_id = %user_id,
                    run_id = %run.id,
                    fetched = progress.fetched,
                    retried = progress.retried,
                    rate_limit_hits = progress.rate_limit_hits,
                    "Ingest run completed"
                );

                Ok(IngestSummary {
                    run_id: run.id,
                    following_refreshed: state.following_refreshed,
                    authors_processed,
                    fetched: progress.fetched,
                    retried: progress.retried,
                    rate_limit_hits: progress.rate_limit_hits,
                })
            }
            Err(err) => {
                let status = err.run_status();
                tracing::error!(
                    user_id = %user_id,
                    run_id = %run.id,
                    status = %status,
                    fetched = progress.fetched,
                    error = %err,
                    "Ingest run failed"
                );

                let outcome = RunOutcome {
                    status,
                    progress,
                    err_text: Some(err.to_string()),
                    completed_at: self.clock.now(),
                };
                if let Err(e) = self.store.finalize_run(&run.id, &outcome).await {
                    tracing::error!(run_id = %run.id, error = %e, "Failed to finalize run");
                }

                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        user: &User,
        run_id: &str,
        mode: SyncMode,
        state: &mut RunState,
    ) -> Result<usize, IngestError> {
        self.refresh_following(user, state).await?;

        let following = self.store.following(user.id).await?;
        tracing::info!(
            user_id = %user.id,
            run_id = %run_id,
            authors = following.len(),
            "Backfilling posts"
        );

        for (idx, entry) in following.iter().enumerate() {
            if idx > 0 {
                sleep(self.config.author_delay).await;
            }

            let newest = self.backfill_author(user, entry, mode, state).await?;

            state.cursor = idx as i64 + 1;
            if let Err(e) = self.store.update_progress(run_id, &state.progress()).await {
                tracing::warn!(run_id = %run_id, error = %e, "Failed to checkpoint progress");
            }

            if let Some(seen_at) = newest {
                if let Err(e) = self.store.update_last_seen(entry.author_id, seen_at).await {
                    tracing::warn!(
                        author_handle = %entry.handle,
                        error = %e,
                        "Failed to update author last seen"
                    );
                }
            }
        }

        Ok(following.len())
    }

    /// Phase A: page the user's following list into the relationship store
    async fn refresh_following(&self, user: &User, state: &mut RunState) -> Result<(), IngestError> {
        let limit = self.config.following_limit;
        let feed = self.feed.as_ref();
        let handle = user.handle.as_str();
        let mut cursor: Option<String> = None;
        let mut processed = 0usize;

        'pages: loop {
            let page_cursor = cursor.as_deref();
            let page = self
                .config
                .retry
                .run(&mut state.stats, || feed.fetch_following(handle, page_cursor))
                .await
                .map_err(|e| IngestError::feed(format!("fetch following for {}", handle), e))?;

            tracing::debug!(
                user_id = %user.id,
                count = page.items.len(),
                has_next_page = page.has_next_page,
                "Fetched following page"
            );

            for account in &page.items {
                if processed >= limit {
                    break 'pages;
                }

                let Ok(author_id) = account.id.parse::<i64>() else {
                    tracing::warn!(account_id = %account.id, "Skipping account with invalid id");
                    continue;
                };

                processed += 1;
                let now = self.clock.now();
                self.store
                    .upsert_author(&Author {
                        id: author_id,
                        handle: account.handle.clone(),
                        display_name: account.display_name.clone(),
                        last_seen_at: None,
                    })
                    .await?;

                if self
                    .store
                    .upsert_following(user.id, author_id, now, limit)
                    .await?
                {
                    state.following_refreshed += 1;
                } else {
                    tracing::debug!(
                        author_handle = %account.handle,
                        limit,
                        "Following limit reached, relationship not stored"
                    );
                }
            }

            if processed >= limit {
                break;
            }

            match page.continuation() {
                Some(next) => {
                    cursor = Some(next.to_string());
                    sleep(self.config.page_delay).await;
                }
                None => break,
            }
        }

        tracing::info!(
            user_id = %user.id,
            processed,
            refreshed = state.following_refreshed,
            "Following refreshed"
        );
        Ok(())
    }

    /// Phase B for one author; returns the newest kept publication time
    async fn backfill_author(
        &self,
        user: &User,
        entry: &FollowingEntry,
        mode: SyncMode,
        state: &mut RunState,
    ) -> Result<Option<OffsetDateTime>, IngestError> {
        if entry.handle.is_empty() {
            tracing::warn!(author_id = entry.author_id, "Skipping author without handle");
            return Ok(None);
        }

        let feed = self.feed.as_ref();
        let handle = entry.handle.as_str();
        let mut cursor: Option<String> = None;
        let mut newest: Option<OffsetDateTime> = None;

        loop {
            let page_cursor = cursor.as_deref();
            let page = match self
                .config
                .retry
                .run(&mut state.stats, || feed.fetch_posts(handle, page_cursor))
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(
                        author_handle = %handle,
                        rate_limited = e.is_rate_limited(),
                        error = %e,
                        "Failed to fetch posts, skipping author"
                    );
                    break;
                }
            };

            tracing::debug!(
                author_handle = %handle,
                count = page.items.len(),
                has_next_page = page.has_next_page,
                "Fetched posts page"
            );

            let mut reached_cutoff = false;
            for item in &page.items {
                if !is_original_post(item) {
                    continue;
                }

                let Some(published_at) = parse_post_timestamp(&item.created_at) else {
                    tracing::warn!(
                        post_id = %item.id,
                        created_at = %item.created_at,
                        "Skipping post with unparsable timestamp"
                    );
                    continue;
                };

                if mode.is_past_cutoff(published_at) {
                    reached_cutoff = true;
                    break;
                }

                if newest.is_none_or(|n| published_at > n) {
                    newest = Some(published_at);
                }

                if self.store_post(user, entry, item, published_at, state).await? {
                    state.fetched += 1;
                }
            }

            if reached_cutoff || !mode.is_backfill() {
                break;
            }

            match page.continuation() {
                Some(next) => {
                    cursor = Some(next.to_string());
                    sleep(self.config.page_delay).await;
                }
                None => break,
            }
        }

        Ok(newest)
    }

    /// Insert one post unless already stored; returns whether a row was written
    async fn store_post(
        &self,
        user: &User,
        entry: &FollowingEntry,
        item: &FeedPost,
        published_at: OffsetDateTime,
        state: &mut RunState,
    ) -> Result<bool, IngestError> {
        let Ok(post_id) = item.id.parse::<i64>() else {
            tracing::warn!(post_id = %item.id, "Skipping post with invalid id");
            return Ok(false);
        };

        if self.store.post_exists(user.id, post_id).await? {
            tracing::debug!(post_id, "Post already stored");
            return Ok(false);
        }

        let descriptions = self.describe_media(item, state).await;
        let now = self.clock.now();
        let url = if item.url.is_empty() {
            format!("https://twitter.com/{}/status/{}", entry.handle, post_id)
        } else {
            item.url.clone()
        };

        let post = Post {
            user_id: user.id,
            post_id,
            author_id: entry.author_id,
            published_at,
            url,
            text: append_media_descriptions(&item.text, &descriptions),
            conversation_id: item.conversation_id.as_deref().and_then(|c| c.parse().ok()),
            ingested_at: now,
            first_visible_at: now,
            edited_seen: false,
        };

        match self.store.insert_post(&post).await {
            Ok(()) => Ok(true),
            Err(StoreError::Conflict(_)) => {
                tracing::debug!(post_id, "Post stored concurrently");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort media descriptions within the per-run budget
    async fn describe_media(&self, item: &FeedPost, state: &mut RunState) -> Vec<String> {
        let Some(media) = &self.media else {
            return Vec::new();
        };
        if item.media.is_empty() {
            return Vec::new();
        }

        let mut descriptions = Vec::new();
        let budget = self.config.max_media_per_run;

        let remaining = budget
            .saturating_sub(state.media_used)
            .min(self.config.max_images_per_post);
        let urls: Vec<String> = item
            .media
            .photos
            .iter()
            .take(remaining)
            .map(|p| p.url.clone())
            .collect();

        if !urls.is_empty() {
            state.media_used += urls.len();
            match media.describe_images(&urls).await {
                Ok(described) => {
                    for (i, text) in described.iter().enumerate() {
                        descriptions.push(format!("[Image {}: {}]", i + 1, text));
                    }
                }
                Err(e) => {
                    tracing::warn!(post_id = %item.id, error = %e, "Image description failed");
                }
            }
        }

        for (i, video) in item.media.videos.iter().enumerate() {
            if state.media_used >= budget {
                break;
            }
            state.media_used += 1;

            let duration_secs = video.duration_ms / 1000;
            let size_bytes = video.size_bytes.unwrap_or(0);
            match media
                .transcribe_video(&video.url, duration_secs, size_bytes)
                .await
            {
                Ok(text) => descriptions.push(format!("[Video {} transcription: {}]", i + 1, text)),
                Err(e) => {
                    tracing::debug!(post_id = %item.id, error = %e, "Video transcription skipped");
                }
            }
        }

        if state.media_used >= budget && !item.media.is_empty() {
            tracing::debug!(budget, "Media enrichment budget exhausted for this run");
        }

        descriptions
    }
}

/// Convert a backfill window in hours, rejecting windows past the maximum
pub fn backfill_window(hours: u32) -> Result<Duration, IngestError> {
    if hours > MAX_BACKFILL_HOURS {
        return Err(IngestError::InvalidBackfill {
            hours,
            max: MAX_BACKFILL_HOURS,
        });
    }
    Ok(Duration::from_secs(u64::from(hours) * 3600))
}
