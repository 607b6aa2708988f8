//! Domain models and value objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Local user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A local account whose feed gets ingested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Handle on the feed platform, used to page the following list
    pub handle: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Global profile of a feed participant (not user-scoped)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    /// Numeric platform ID
    pub id: i64,
    pub handle: String,
    pub display_name: Option<String>,
    /// Most recent post observed across all users
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen_at: Option<OffsetDateTime>,
}

/// A followed author joined with the relationship's last-checked timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowingEntry {
    pub author_id: i64,
    pub handle: String,
    pub display_name: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_checked_at: Option<OffsetDateTime>,
}

/// One ingested post, scoped to a single user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub user_id: UserId,
    /// Platform post ID; (user_id, post_id) is the idempotency key
    pub post_id: i64,
    pub author_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub url: String,
    /// Post text, with media descriptions appended when enrichment ran
    pub text: String,
    pub conversation_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub ingested_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub first_visible_at: OffsetDateTime,
    /// Reserved for an edit-tracking producer; ingestion always writes `false`
    pub edited_seen: bool,
}

/// A post joined with author display information (the Q&A read path)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithAuthor {
    #[serde(flatten)]
    pub post: Post,
    pub handle: String,
    pub display_name: Option<String>,
}

/// Terminal status of an ingest run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    RateLimited,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::RateLimited => "rate_limited",
            RunStatus::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(RunStatus::Ok),
            "rate_limited" => Ok(RunStatus::RateLimited),
            "error" => Ok(RunStatus::Error),
            other => Err(format!("unknown run status: {}", other)),
        }
    }
}

/// One attempt to synchronize one user's feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRun {
    /// ULID, sortable by creation time
    pub id: String,
    pub user_id: UserId,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    /// Absent while the run is active
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    /// "ok" while active; terminal once `completed_at` is set
    pub status: RunStatus,
    /// Number of authors checkpointed so far; only ever increases
    pub cursor: i64,
    pub fetched_count: u32,
    pub retried: u32,
    pub rate_limit_hits: u32,
    pub err_text: Option<String>,
}

impl IngestRun {
    /// Start a new run with zero counters
    pub fn start(user_id: UserId, started_at: OffsetDateTime) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            user_id,
            started_at,
            completed_at: None,
            status: RunStatus::Ok,
            cursor: 0,
            fetched_count: 0,
            retried: 0,
            rate_limit_hits: 0,
            err_text: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.completed_at.is_none()
    }
}

/// Counters carried through a run and checkpointed into the ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunProgress {
    pub cursor: i64,
    pub fetched: u32,
    pub retried: u32,
    pub rate_limit_hits: u32,
}

/// Terminal outcome written when a run is finalized
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub progress: RunProgress,
    pub err_text: Option<String>,
    pub completed_at: OffsetDateTime,
}

/// Account as returned by the feed API (follow lists, post authors, profiles)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedUser {
    /// Numeric ID as sent on the wire
    pub id: String,
    pub handle: String,
    pub display_name: Option<String>,
}

/// Photo attached to a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub url: String,
}

/// Video attached to a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub url: String,
    pub duration_ms: u64,
    /// The API rarely reports sizes; unknown sizes are treated as zero
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub photos: Vec<Photo>,
    pub videos: Vec<Video>,
}

impl Media {
    pub fn is_empty(&self) -> bool {
        self.photos.is_empty() && self.videos.is_empty()
    }
}

/// A post as returned by the feed API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedPost {
    pub id: String,
    pub url: String,
    pub text: String,
    /// Raw timestamp; parsed by the orchestrator so bad values skip one post
    pub created_at: String,
    pub author: FeedUser,
    pub is_reply: bool,
    pub in_reply_to_user_id: Option<String>,
    pub conversation_id: Option<String>,
    pub is_repost: bool,
    pub is_quote: bool,
    pub media: Media,
}

/// One page of a paginated feed API listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
    /// Opaque token for the next page
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            has_next_page: false,
            next_cursor: None,
        }
    }

    pub fn with_next(items: Vec<T>, cursor: impl Into<String>) -> Self {
        Self {
            items,
            has_next_page: true,
            next_cursor: Some(cursor.into()),
        }
    }

    /// Cursor for the next page, if the listing continues
    pub fn continuation(&self) -> Option<&str> {
        if self.has_next_page {
            self.next_cursor.as_deref().filter(|c| !c.is_empty())
        } else {
            None
        }
    }
}
