//! Subcommand implementations and the wiring they share

pub mod config;
pub mod doctor;
pub mod following;
pub mod ingest;
pub mod posts;
pub mod schedule;
pub mod status;
pub mod user;

use anyhow::{Context, Result};
use askfeed_adapters::{
    feed::TwitterApiFeed,
    media::OpenRouterDescriber,
    store::SqliteStore,
};
use askfeed_domain::{SystemClock, User, UserId, UserStore, usecases::Ingestor};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, load_api_key};

pub(crate) type AppIngestor = Ingestor<TwitterApiFeed, SqliteStore, SystemClock>;

pub(crate) async fn open_store(config: &AppConfig) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::new(&config.general.database_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open database: {}",
                config.general.database_path.display()
            )
        })?;
    Ok(Arc::new(store))
}

/// Look a user up by ID, falling back to handle
pub(crate) async fn resolve_user(store: &SqliteStore, user: &str) -> Result<User> {
    if let Ok(id) = user.parse::<UserId>() {
        if let Some(found) = store.get_user(id).await? {
            return Ok(found);
        }
    }

    let handle = user.trim_start_matches('@');
    store
        .get_user_by_handle(handle)
        .await?
        .with_context(|| format!("Unknown user: {}", user))
}

pub(crate) fn build_ingestor(config: &AppConfig, store: Arc<SqliteStore>) -> Result<AppIngestor> {
    let api_key = load_api_key(&config.feed.api_key_env, "feed")?;
    let feed = TwitterApiFeed::with_base_url(
        api_key,
        config.feed.base_url.clone(),
        Duration::from_secs(config.feed.timeout_secs),
    )
    .context("Failed to build feed client")?;

    let ingestor = Ingestor::new(
        Arc::new(feed),
        store,
        Arc::new(SystemClock),
        config.ingest_config(),
    );

    if !config.media.enabled {
        return Ok(ingestor);
    }

    let media_key = load_api_key(&config.media.api_key_env, "media")?;
    let media = OpenRouterDescriber::new(
        media_key,
        config.media.base_url.clone(),
        config.media.model.clone(),
        Duration::from_secs(config.media.timeout_secs),
        config.media_limits(),
    )
    .context("Failed to build media client")?;

    tracing::info!(model = %config.media.model, "Media enrichment enabled");
    Ok(ingestor.with_media(Arc::new(media)))
}

pub(crate) fn format_time(ts: time::OffsetDateTime) -> String {
    ts.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| ts.to_string())
}
