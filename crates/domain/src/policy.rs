//! Ingestion policy: which posts are kept and where pagination stops

use std::time::Duration;

use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use crate::model::FeedPost;

/// Classic platform timestamp, e.g. `Wed Oct 10 20:19:24 +0000 2018`
const CLASSIC_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute] [year]"
);

/// How far back a post fetch phase paginates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Lightweight refresh: first page per author only
    Regular,
    /// Paginate until a post older than `cutoff` shows up
    Backfill { cutoff: OffsetDateTime },
}

impl SyncMode {
    /// A zero window selects regular mode
    pub fn from_window(now: OffsetDateTime, window: Duration) -> Self {
        if window.is_zero() {
            SyncMode::Regular
        } else {
            SyncMode::Backfill {
                cutoff: now - window,
            }
        }
    }

    pub fn is_backfill(&self) -> bool {
        matches!(self, SyncMode::Backfill { .. })
    }

    /// Whether a post published at `published_at` lies past the cutoff
    pub fn is_past_cutoff(&self, published_at: OffsetDateTime) -> bool {
        match self {
            SyncMode::Regular => false,
            SyncMode::Backfill { cutoff } => published_at < *cutoff,
        }
    }
}

/// Original posts are neither reposts nor quotes; replies count only when
/// they continue the author's own thread
pub fn is_original_post(post: &FeedPost) -> bool {
    if post.is_repost || post.is_quote {
        return false;
    }

    if !post.is_reply {
        return true;
    }

    match post.in_reply_to_user_id.as_deref() {
        Some(target) => !target.is_empty() && target == post.author.id,
        None => false,
    }
}

/// Parse a post timestamp in RFC 3339 or the classic platform format
pub fn parse_post_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }

    OffsetDateTime::parse(raw, CLASSIC_TIMESTAMP_FORMAT).ok()
}

/// Append bracketed media descriptions to a post's text
pub fn append_media_descriptions(text: &str, descriptions: &[String]) -> String {
    if descriptions.is_empty() {
        return text.to_string();
    }
    format!("{}\n\n{}", text, descriptions.join(" "))
}
