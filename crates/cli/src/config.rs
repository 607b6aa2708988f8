//! Configuration loading and management

use anyhow::{Context, Result, bail};
use askfeed_adapters::media::MediaLimits;
use askfeed_domain::usecases::{IngestConfig, RetryPolicy};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub ingest: IngestSection,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSection {
    #[serde(default = "default_following_limit")]
    pub following_limit: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    #[serde(default = "default_author_delay_ms")]
    pub author_delay_ms: u64,

    #[serde(default = "default_backfill_hours")]
    pub default_backfill_hours: u32,

    #[serde(default = "default_stale_run_after_secs")]
    pub stale_run_after_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default)]
    pub backfill_hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_feed_base_url")]
    pub base_url: String,

    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_media_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_media_base_url")]
    pub base_url: String,

    #[serde(default = "default_media_model")]
    pub model: String,

    #[serde(default = "default_media_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_images_per_post")]
    pub max_images_per_post: usize,

    #[serde(default = "default_max_media_per_run")]
    pub max_media_per_run: usize,

    #[serde(default = "default_max_video_duration_secs")]
    pub max_video_duration_secs: u64,

    #[serde(default = "default_max_video_size_bytes")]
    pub max_video_size_bytes: u64,
}

// Default value functions
fn default_database_path() -> PathBuf {
    PathBuf::from("./askfeed.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_following_limit() -> usize {
    150
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    2000
}

fn default_page_delay_ms() -> u64 {
    100
}

fn default_author_delay_ms() -> u64 {
    200
}

fn default_backfill_hours() -> u32 {
    24
}

fn default_stale_run_after_secs() -> u64 {
    6 * 3600
}

fn default_interval_secs() -> u64 {
    900
}

fn default_feed_api_key_env() -> String {
    "TWITTERAPI_IO_KEY".to_string()
}

fn default_feed_base_url() -> String {
    askfeed_adapters::feed_api::DEFAULT_BASE_URL.to_string()
}

fn default_feed_timeout() -> u64 {
    30
}

fn default_media_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_media_base_url() -> String {
    askfeed_adapters::media::DEFAULT_BASE_URL.to_string()
}

fn default_media_model() -> String {
    askfeed_adapters::media::DEFAULT_MODEL.to_string()
}

fn default_media_timeout() -> u64 {
    60
}

fn default_max_images_per_post() -> usize {
    4
}

fn default_max_media_per_run() -> usize {
    200
}

fn default_max_video_duration_secs() -> u64 {
    90
}

fn default_max_video_size_bytes() -> u64 {
    25 * 1024 * 1024
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_log_level(),
        }
    }
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            following_limit: default_following_limit(),
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            page_delay_ms: default_page_delay_ms(),
            author_delay_ms: default_author_delay_ms(),
            default_backfill_hours: default_backfill_hours(),
            stale_run_after_secs: default_stale_run_after_secs(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            backfill_hours: 0,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_feed_api_key_env(),
            base_url: default_feed_base_url(),
            timeout_secs: default_feed_timeout(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key_env: default_media_api_key_env(),
            base_url: default_media_base_url(),
            model: default_media_model(),
            timeout_secs: default_media_timeout(),
            max_images_per_post: default_max_images_per_post(),
            max_media_per_run: default_max_media_per_run(),
            max_video_duration_secs: default_max_video_duration_secs(),
            max_video_size_bytes: default_max_video_size_bytes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            bail!("Config file not found: {}", path.display());
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ASKFEED")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Tuning knobs for the ingestion pipeline
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            following_limit: self.ingest.following_limit,
            retry: RetryPolicy {
                max_retries: self.ingest.max_retries,
                base_delay: Duration::from_millis(self.ingest.base_backoff_ms),
            },
            page_delay: Duration::from_millis(self.ingest.page_delay_ms),
            author_delay: Duration::from_millis(self.ingest.author_delay_ms),
            max_media_per_run: self.media.max_media_per_run,
            max_images_per_post: self.media.max_images_per_post,
        }
    }

    pub fn media_limits(&self) -> MediaLimits {
        MediaLimits {
            max_images_per_post: self.media.max_images_per_post,
            max_video_duration_secs: self.media.max_video_duration_secs,
            max_video_size_bytes: self.media.max_video_size_bytes,
        }
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# askfeed configuration

[general]
database_path = "./askfeed.sqlite"
log_level = "info"

[ingest]
# Follow relationships kept per user
following_limit = 150
# Retries after HTTP 429, with exponential backoff from base_backoff_ms
max_retries = 3
base_backoff_ms = 2000
page_delay_ms = 100
author_delay_ms = 200
# Used by `askfeed ingest` when --backfill-hours is not given (max 720)
default_backfill_hours = 24
# Runs left active longer than this are closed as abandoned by `schedule`
stale_run_after_secs = 21600

[schedule]
interval_secs = 900
# 0 refreshes only the newest page per author
backfill_hours = 0

[feed]
api_key_env = "TWITTERAPI_IO_KEY"
base_url = "https://api.twitterapi.io"
timeout_secs = 30

[media]
enabled = false
api_key_env = "OPENROUTER_API_KEY"
base_url = "https://openrouter.ai/api/v1"
model = "openai/gpt-4o-mini"
timeout_secs = 60
max_images_per_post = 4
max_media_per_run = 200
max_video_duration_secs = 90
max_video_size_bytes = 26214400
"#
        .to_string()
    }
}

/// Read a secret from the environment variable named in the config
pub fn load_api_key(env_var: &str, service: &str) -> Result<SecretString> {
    if env_var.trim().is_empty() {
        bail!("No API key env var configured for {}", service);
    }

    let key = std::env::var(env_var)
        .with_context(|| format!("Missing API key env var {} for {}", env_var, service))?;

    if key.trim().is_empty() {
        bail!("API key env var {} is empty for {}", env_var, service);
    }

    Ok(SecretString::new(key.into()))
}
