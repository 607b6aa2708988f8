//! Posts command - read ingested posts for a date range

use anyhow::{Context, Result, bail};
use askfeed_domain::PostStore;
use std::path::PathBuf;
use time::{Duration, OffsetDateTime, format_description::well_known::Rfc3339};

use crate::args::PostsArgs;
use crate::commands::{format_time, open_store, resolve_user};
use crate::config::AppConfig;

pub async fn execute(args: PostsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let store = open_store(&config).await?;
    let user = resolve_user(&store, &args.user).await?;

    let now = OffsetDateTime::now_utc();
    let to = parse_bound(args.to.as_deref(), "--to")?.unwrap_or(now);
    let from = parse_bound(args.from.as_deref(), "--from")?.unwrap_or(to - Duration::hours(24));

    if from > to {
        bail!("--from must not be after --to");
    }
    if args.limit == 0 {
        bail!("--limit must be at least 1");
    }

    let posts = store.posts_in_range(user.id, from, to, args.limit).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
        return Ok(());
    }

    if posts.is_empty() {
        println!(
            "No posts for @{} between {} and {}",
            user.handle,
            format_time(from),
            format_time(to)
        );
        return Ok(());
    }

    for item in posts {
        println!(
            "[{}] @{}: {}",
            format_time(item.post.published_at),
            item.handle,
            item.post.text
        );
        println!("    {}", item.post.url);
    }

    Ok(())
}

fn parse_bound(value: Option<&str>, flag: &str) -> Result<Option<OffsetDateTime>> {
    value
        .map(|raw| {
            OffsetDateTime::parse(raw, &Rfc3339)
                .with_context(|| format!("{} must be an RFC 3339 timestamp, got {}", flag, raw))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bound_accepts_rfc3339() {
        let parsed = parse_bound(Some("2024-12-01T08:00:00Z"), "--from")
            .unwrap()
            .unwrap();
        assert_eq!(parsed.unix_timestamp(), 1_733_040_000);
    }

    #[test]
    fn parse_bound_rejects_other_formats() {
        let err = parse_bound(Some("2024-12-01"), "--to").unwrap_err();
        assert!(err.to_string().contains("--to must be an RFC 3339 timestamp"));
    }

    #[test]
    fn parse_bound_passes_through_absent_value() {
        assert!(parse_bound(None, "--from").unwrap().is_none());
    }
}
