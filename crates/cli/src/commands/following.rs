//! Following command - list followed authors

use anyhow::Result;
use askfeed_domain::FollowStore;
use std::path::PathBuf;

use crate::args::FollowingArgs;
use crate::commands::{format_time, open_store, resolve_user};
use crate::config::AppConfig;

pub async fn execute(args: FollowingArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let store = open_store(&config).await?;
    let user = resolve_user(&store, &args.user).await?;

    let following = store.following(user.id).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&following)?);
        return Ok(());
    }

    println!("@{} follows {} authors", user.handle, following.len());
    for entry in following {
        let last_seen = entry
            .last_seen_at
            .map(format_time)
            .unwrap_or_else(|| "never".to_string());
        match entry.display_name {
            Some(name) => println!("  @{} ({})  last post: {}", entry.handle, name, last_seen),
            None => println!("  @{}  last post: {}", entry.handle, last_seen),
        }
    }

    Ok(())
}
