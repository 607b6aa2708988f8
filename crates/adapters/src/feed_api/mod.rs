//! Feed API adapters

mod read;

pub use read::{DEFAULT_BASE_URL, TwitterApiFeed, normalize_post_url};

use async_trait::async_trait;
use askfeed_domain::{FeedError, FeedPost, FeedSource, FeedUser, Page};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
enum Failure {
    RateLimited,
    Api(u16),
}

impl Failure {
    fn to_error(self) -> FeedError {
        match self {
            Failure::RateLimited => FeedError::RateLimited(None),
            Failure::Api(status) => FeedError::Api {
                status,
                message: "stub failure".to_string(),
            },
        }
    }
}

#[derive(Default)]
struct StubState {
    following: HashMap<String, Vec<Vec<FeedUser>>>,
    posts: HashMap<String, Vec<Vec<FeedPost>>>,
    /// Failures served before any real page, consumed one per call
    following_failures: HashMap<String, Vec<Failure>>,
    post_failures: HashMap<String, Vec<Failure>>,
    /// Failures served on every call
    broken_posts: HashMap<String, Failure>,
    calls: Vec<String>,
}

/// Scripted feed source for testing and offline mode.
///
/// Pages are addressed by cursor: no cursor is page 0, cursor `"n"` is page n.
#[derive(Default)]
pub struct StubFeedSource {
    state: Mutex<StubState>,
}

impl StubFeedSource {
    /// Create an empty stub
    pub fn empty() -> Self {
        Self::default()
    }

    /// Script the pages of `handle`'s following list
    pub fn with_following(self, handle: &str, pages: Vec<Vec<FeedUser>>) -> Self {
        self.lock().following.insert(handle.to_string(), pages);
        self
    }

    /// Script the pages of `handle`'s timeline, newest first
    pub fn with_posts(self, handle: &str, pages: Vec<Vec<FeedPost>>) -> Self {
        self.lock().posts.insert(handle.to_string(), pages);
        self
    }

    /// Answer the next `times` following requests for `handle` with HTTP 429
    pub fn rate_limit_following(self, handle: &str, times: usize) -> Self {
        self.lock()
            .following_failures
            .insert(handle.to_string(), vec![Failure::RateLimited; times]);
        self
    }

    /// Answer the next `times` timeline requests for `handle` with HTTP 429
    pub fn rate_limit_posts(self, handle: &str, times: usize) -> Self {
        self.lock()
            .post_failures
            .insert(handle.to_string(), vec![Failure::RateLimited; times]);
        self
    }

    /// Answer every timeline request for `handle` with an HTTP error
    pub fn fail_posts(self, handle: &str, status: u16) -> Self {
        self.lock()
            .broken_posts
            .insert(handle.to_string(), Failure::Api(status));
        self
    }

    /// Every request served so far, as `"<endpoint>:<handle>:<cursor>"`
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of timeline requests made for `handle`
    pub fn post_requests(&self, handle: &str) -> usize {
        let prefix = format!("posts:{}:", handle);
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn page_index(cursor: Option<&str>) -> Result<usize, FeedError> {
    match cursor {
        None => Ok(0),
        Some(c) => c
            .parse()
            .map_err(|_| FeedError::Decode(format!("unknown cursor {}", c))),
    }
}

fn serve<T: Clone>(pages: Option<&Vec<Vec<T>>>, index: usize) -> Page<T> {
    let Some(pages) = pages else {
        return Page::last(Vec::new());
    };
    let items = pages.get(index).cloned().unwrap_or_default();
    if index + 1 < pages.len() {
        Page::with_next(items, (index + 1).to_string())
    } else {
        Page::last(items)
    }
}

fn take_failure(failures: &mut HashMap<String, Vec<Failure>>, handle: &str) -> Option<Failure> {
    let queue = failures.get_mut(handle)?;
    if queue.is_empty() {
        None
    } else {
        Some(queue.remove(0))
    }
}

#[async_trait]
impl FeedSource for StubFeedSource {
    async fn fetch_following(
        &self,
        handle: &str,
        cursor: Option<&str>,
    ) -> Result<Page<FeedUser>, FeedError> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("following:{}:{}", handle, cursor.unwrap_or("")));

        if let Some(failure) = take_failure(&mut state.following_failures, handle) {
            return Err(failure.to_error());
        }

        let index = page_index(cursor)?;
        Ok(serve(state.following.get(handle), index))
    }

    async fn fetch_posts(
        &self,
        handle: &str,
        cursor: Option<&str>,
    ) -> Result<Page<FeedPost>, FeedError> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("posts:{}:{}", handle, cursor.unwrap_or("")));

        if let Some(failure) = state.broken_posts.get(handle) {
            return Err(failure.to_error());
        }
        if let Some(failure) = take_failure(&mut state.post_failures, handle) {
            return Err(failure.to_error());
        }

        let index = page_index(cursor)?;
        Ok(serve(state.posts.get(handle), index))
    }

    async fn fetch_profile(&self, handle: &str) -> Result<FeedUser, FeedError> {
        let mut state = self.lock();
        state.calls.push(format!("profile:{}:", handle));

        Ok(FeedUser {
            id: "0".to_string(),
            handle: handle.to_string(),
            display_name: None,
        })
    }
}
