//! In-memory store for testing and offline mode

use askfeed_domain::{
    Author, AuthorStore, FollowStore, FollowingEntry, IngestRun, Post, PostStore, PostWithAuthor,
    RunLedger, RunOutcome, RunProgress, RunStatus, StoreError, User, UserId, UserStore,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use time::OffsetDateTime;

#[derive(Debug, Clone)]
struct FollowRow {
    author_id: i64,
    last_checked_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    /// Insertion order doubles as creation order
    runs: Vec<IngestRun>,
    authors: HashMap<i64, Author>,
    following: HashMap<UserId, Vec<FollowRow>>,
    posts: HashMap<UserId, BTreeMap<i64, Post>>,
}

/// In-memory store implementation
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// All runs for a user in creation order, including active ones
    pub fn runs_for(&self, user_id: UserId) -> Result<Vec<IngestRun>, StoreError> {
        let state = self.read()?;
        Ok(state
            .runs
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    /// Stored posts for a user ordered by post id
    pub fn posts_for(&self, user_id: UserId) -> Result<Vec<Post>, StoreError> {
        let state = self.read()?;
        Ok(state
            .posts
            .get(&user_id)
            .map(|posts| posts.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.users.iter().any(|u| u.handle == user.handle) {
            return Err(StoreError::Conflict(format!(
                "user @{} already exists",
                user.handle
            )));
        }
        state.users.push(user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let state = self.read()?;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_handle(&self, handle: &str) -> Result<Option<User>, StoreError> {
        let state = self.read()?;
        Ok(state.users.iter().find(|u| u.handle == handle).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.read()?.users.clone())
    }
}

#[async_trait]
impl RunLedger for InMemoryStore {
    async fn create_run(&self, run: &IngestRun) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if let Some(active) = state
            .runs
            .iter()
            .find(|r| r.user_id == run.user_id && r.is_active())
        {
            return Err(StoreError::RunAlreadyActive {
                user_id: run.user_id,
                run_id: active.id.clone(),
            });
        }
        state.runs.push(run.clone());
        Ok(())
    }

    async fn current_run(&self, user_id: UserId) -> Result<Option<IngestRun>, StoreError> {
        let state = self.read()?;
        Ok(state
            .runs
            .iter()
            .find(|r| r.user_id == user_id && r.is_active())
            .cloned())
    }

    async fn recent_runs(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<IngestRun>, StoreError> {
        let state = self.read()?;
        let mut runs: Vec<IngestRun> = state
            .runs
            .iter()
            .filter(|r| r.user_id == user_id && !r.is_active())
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.completed_at.cmp(&a.completed_at).then(b.id.cmp(&a.id)));
        runs.truncate(limit as usize);
        Ok(runs)
    }

    async fn last_sync_at(&self, user_id: UserId) -> Result<Option<OffsetDateTime>, StoreError> {
        let state = self.read()?;
        Ok(state
            .runs
            .iter()
            .filter(|r| r.user_id == user_id)
            .filter_map(|r| r.completed_at)
            .max())
    }

    async fn update_progress(
        &self,
        run_id: &str,
        progress: &RunProgress,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == run_id && r.is_active())
            .ok_or_else(|| StoreError::NotFound(format!("active run {}", run_id)))?;

        run.cursor = run.cursor.max(progress.cursor);
        run.fetched_count = progress.fetched;
        run.retried = progress.retried;
        run.rate_limit_hits = progress.rate_limit_hits;
        Ok(())
    }

    async fn finalize_run(&self, run_id: &str, outcome: &RunOutcome) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run {}", run_id)))?;

        if !run.is_active() {
            return Err(StoreError::Conflict(format!(
                "run {} already finalized",
                run_id
            )));
        }

        run.completed_at = Some(outcome.completed_at);
        run.status = outcome.status;
        run.cursor = run.cursor.max(outcome.progress.cursor);
        run.fetched_count = outcome.progress.fetched;
        run.retried = outcome.progress.retried;
        run.rate_limit_hits = outcome.progress.rate_limit_hits;
        run.err_text = outcome.err_text.clone();
        Ok(())
    }

    async fn reconcile_stale_runs(
        &self,
        started_before: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let mut closed = 0;
        for run in state
            .runs
            .iter_mut()
            .filter(|r| r.is_active() && r.started_at < started_before)
        {
            run.completed_at = Some(now);
            run.status = RunStatus::Error;
            run.err_text = Some("abandoned".to_string());
            closed += 1;
        }
        Ok(closed)
    }
}

#[async_trait]
impl AuthorStore for InMemoryStore {
    async fn upsert_author(&self, author: &Author) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let entry = state.authors.entry(author.id).or_insert_with(|| author.clone());
        entry.handle = author.handle.clone();
        entry.display_name = author.display_name.clone();
        if author.last_seen_at.is_some() {
            entry.last_seen_at = author.last_seen_at;
        }
        Ok(())
    }

    async fn get_author(&self, id: i64) -> Result<Option<Author>, StoreError> {
        Ok(self.read()?.authors.get(&id).cloned())
    }

    async fn update_last_seen(&self, id: i64, seen_at: OffsetDateTime) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let author = state
            .authors
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("author {}", id)))?;
        if author.last_seen_at.is_none_or(|prev| prev < seen_at) {
            author.last_seen_at = Some(seen_at);
        }
        Ok(())
    }
}

#[async_trait]
impl FollowStore for InMemoryStore {
    async fn upsert_following(
        &self,
        user_id: UserId,
        author_id: i64,
        checked_at: OffsetDateTime,
        limit: usize,
    ) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        let rows = state.following.entry(user_id).or_default();

        if let Some(row) = rows.iter_mut().find(|r| r.author_id == author_id) {
            row.last_checked_at = checked_at;
            return Ok(true);
        }

        if rows.len() >= limit {
            return Ok(false);
        }

        rows.push(FollowRow {
            author_id,
            last_checked_at: checked_at,
        });
        Ok(true)
    }

    async fn following(&self, user_id: UserId) -> Result<Vec<FollowingEntry>, StoreError> {
        let state = self.read()?;
        let Some(rows) = state.following.get(&user_id) else {
            return Ok(Vec::new());
        };

        Ok(rows
            .iter()
            .map(|row| {
                // A relationship without its author row surfaces with an empty handle
                let author = state.authors.get(&row.author_id);
                FollowingEntry {
                    author_id: row.author_id,
                    handle: author.map(|a| a.handle.clone()).unwrap_or_default(),
                    display_name: author.and_then(|a| a.display_name.clone()),
                    last_seen_at: author.and_then(|a| a.last_seen_at),
                    last_checked_at: Some(row.last_checked_at),
                }
            })
            .collect())
    }

    async fn following_count(&self, user_id: UserId) -> Result<usize, StoreError> {
        Ok(self
            .read()?
            .following
            .get(&user_id)
            .map(Vec::len)
            .unwrap_or(0))
    }
}

#[async_trait]
impl PostStore for InMemoryStore {
    async fn post_exists(&self, user_id: UserId, post_id: i64) -> Result<bool, StoreError> {
        let state = self.read()?;
        Ok(state
            .posts
            .get(&user_id)
            .is_some_and(|posts| posts.contains_key(&post_id)))
    }

    async fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let posts = state.posts.entry(post.user_id).or_default();
        if posts.contains_key(&post.post_id) {
            return Err(StoreError::Conflict(format!(
                "post {} already stored",
                post.post_id
            )));
        }
        posts.insert(post.post_id, post.clone());
        Ok(())
    }

    async fn posts_in_range(
        &self,
        user_id: UserId,
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<PostWithAuthor>, StoreError> {
        let state = self.read()?;
        let Some(posts) = state.posts.get(&user_id) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<PostWithAuthor> = posts
            .values()
            .filter(|p| p.published_at >= from && p.published_at <= to)
            .filter_map(|p| {
                let author = state.authors.get(&p.author_id)?;
                Some(PostWithAuthor {
                    post: p.clone(),
                    handle: author.handle.clone(),
                    display_name: author.display_name.clone(),
                })
            })
            .collect();

        matched.sort_by(|a, b| {
            a.post
                .published_at
                .cmp(&b.post.published_at)
                .then(a.post.post_id.cmp(&b.post.post_id))
        });
        matched.truncate(limit as usize);
        Ok(matched)
    }
}
