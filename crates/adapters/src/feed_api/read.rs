//! twitterapi.io read adapter for follow lists, timelines and profiles

use async_trait::async_trait;
use askfeed_domain::{FeedError, FeedPost, FeedSource, FeedUser, Media, Page, Photo, Video};
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.twitterapi.io";
const USER_AGENT: &str = "askfeed/0.1";

/// twitterapi.io client implementing the feed port
pub struct TwitterApiFeed {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl TwitterApiFeed {
    pub fn new(api_key: SecretString) -> Result<Self, FeedError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string(), Duration::from_secs(30))
    }

    pub fn with_base_url(
        api_key: SecretString,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FeedError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, FeedError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .query(params)
            .send()
            .await
            .map_err(|e| FeedError::Network(e.without_url().to_string()))?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FeedError::Auth("API key rejected".to_string()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(FeedError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                message: truncate(&body, 200),
            });
        }

        response
            .json()
            .await
            .map_err(|e| FeedError::Decode(e.without_url().to_string()))
    }
}

/// Canonical post URL: x.com or twitter.com host without `www.`, a
/// `/status/` path, no query or fragment. Anything else falls back to
/// `https://twitter.com/{handle}/status/{id}`.
pub fn normalize_post_url(raw: &str, handle: &str, post_id: &str) -> String {
    let fallback = || format!("https://twitter.com/{}/status/{}", handle, post_id);

    let Ok(parsed) = Url::parse(raw) else {
        return fallback();
    };

    let host = match parsed.host_str() {
        Some(host) => host.trim_start_matches("www."),
        None => return fallback(),
    };

    if host != "x.com" && host != "twitter.com" {
        return fallback();
    }

    if !parsed.path().contains("/status/") {
        return fallback();
    }

    format!("{}://{}{}", parsed.scheme(), host, parsed.path())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}

fn check_status(status: Option<&str>, msg: Option<&str>) -> Result<(), FeedError> {
    match status {
        Some(s) if !s.is_empty() && s != "success" => Err(FeedError::Api {
            status: 200,
            message: format!("status {}: {}", s, msg.unwrap_or_default()),
        }),
        _ => Ok(()),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUser {
    #[serde(default)]
    id: String,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    name: Option<String>,
}

impl From<WireUser> for FeedUser {
    fn from(user: WireUser) -> Self {
        FeedUser {
            id: user.id,
            handle: user.user_name,
            display_name: user.name.filter(|n| !n.is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct UserInfoResponse {
    data: Option<WireUser>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Deserialize)]
struct FollowingResponse {
    #[serde(default)]
    followings: Vec<WireUser>,
    #[serde(default)]
    has_next_page: bool,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Deserialize)]
struct TweetsResponse {
    #[serde(default)]
    data: Option<TweetsData>,
    #[serde(default)]
    has_next_page: bool,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Deserialize)]
struct TweetsData {
    #[serde(default)]
    tweets: Vec<WireTweet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTweet {
    id: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    is_reply: bool,
    #[serde(default)]
    in_reply_to_user_id: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
    author: WireUser,
    #[serde(default, rename = "quoted_tweet")]
    quoted_tweet: Option<serde_json::Value>,
    #[serde(default, rename = "retweeted_tweet")]
    retweeted_tweet: Option<serde_json::Value>,
    #[serde(default)]
    media: Option<WireMedia>,
}

#[derive(Deserialize)]
struct WireMedia {
    #[serde(default)]
    photos: Vec<WirePhoto>,
    #[serde(default)]
    videos: Vec<WireVideo>,
}

#[derive(Deserialize)]
struct WirePhoto {
    url: String,
}

#[derive(Deserialize)]
struct WireVideo {
    url: String,
    #[serde(default)]
    duration_ms: Option<u64>,
    #[serde(default)]
    size_bytes: Option<u64>,
}

impl From<WireTweet> for FeedPost {
    fn from(tweet: WireTweet) -> Self {
        let url = normalize_post_url(&tweet.url, &tweet.author.user_name, &tweet.id);
        let media = tweet
            .media
            .map(|m| Media {
                photos: m.photos.into_iter().map(|p| Photo { url: p.url }).collect(),
                videos: m
                    .videos
                    .into_iter()
                    .map(|v| Video {
                        url: v.url,
                        duration_ms: v.duration_ms.unwrap_or(0),
                        size_bytes: v.size_bytes,
                    })
                    .collect(),
            })
            .unwrap_or_default();

        FeedPost {
            id: tweet.id,
            url,
            text: tweet.text,
            created_at: tweet.created_at,
            author: tweet.author.into(),
            is_reply: tweet.is_reply,
            in_reply_to_user_id: tweet.in_reply_to_user_id.filter(|id| !id.is_empty()),
            conversation_id: tweet.conversation_id.filter(|id| !id.is_empty()),
            is_repost: tweet.retweeted_tweet.is_some_and(|v| !v.is_null()),
            is_quote: tweet.quoted_tweet.is_some_and(|v| !v.is_null()),
            media,
        }
    }
}

#[async_trait]
impl FeedSource for TwitterApiFeed {
    async fn fetch_following(
        &self,
        handle: &str,
        cursor: Option<&str>,
    ) -> Result<Page<FeedUser>, FeedError> {
        let mut params = vec![("userName", handle)];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let response: FollowingResponse = self
            .get_json("/twitter/user/followings", &params)
            .await?;
        check_status(response.status.as_deref(), response.msg.as_deref())?;

        tracing::debug!(
            handle = %handle,
            count = response.followings.len(),
            has_next_page = response.has_next_page,
            "Fetched following page"
        );

        Ok(Page {
            items: response.followings.into_iter().map(FeedUser::from).collect(),
            has_next_page: response.has_next_page,
            next_cursor: response.next_cursor,
        })
    }

    async fn fetch_posts(
        &self,
        handle: &str,
        cursor: Option<&str>,
    ) -> Result<Page<FeedPost>, FeedError> {
        let mut params = vec![("userName", handle)];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let response: TweetsResponse = self
            .get_json("/twitter/user/last_tweets", &params)
            .await?;
        check_status(response.status.as_deref(), response.msg.as_deref())?;

        let tweets = response.data.map(|d| d.tweets).unwrap_or_default();

        tracing::debug!(
            handle = %handle,
            count = tweets.len(),
            has_next_page = response.has_next_page,
            "Fetched posts page"
        );

        Ok(Page {
            items: tweets.into_iter().map(FeedPost::from).collect(),
            has_next_page: response.has_next_page,
            next_cursor: response.next_cursor,
        })
    }

    async fn fetch_profile(&self, handle: &str) -> Result<FeedUser, FeedError> {
        let response: UserInfoResponse = self
            .get_json("/twitter/user/info", &[("userName", handle)])
            .await?;
        check_status(response.status.as_deref(), response.msg.as_deref())?;

        response
            .data
            .map(FeedUser::from)
            .ok_or_else(|| FeedError::Decode(format!("missing profile data for @{}", handle)))
    }
}
