//! User command - manage local users

use anyhow::{Result, bail};
use askfeed_domain::{StoreError, User, UserId, UserStore};
use std::path::PathBuf;
use time::OffsetDateTime;

use crate::args::{UserArgs, UserCommands};
use crate::commands::{format_time, open_store};
use crate::config::AppConfig;

pub async fn execute(args: UserArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let store = open_store(&config).await?;

    match args.command {
        UserCommands::Add { handle } => {
            let handle = handle.trim().trim_start_matches('@').to_string();
            if handle.is_empty() {
                bail!("Handle must not be empty");
            }

            let user = User {
                id: UserId::new(),
                handle,
                created_at: OffsetDateTime::now_utc(),
            };

            match store.create_user(&user).await {
                Ok(()) => {}
                Err(StoreError::Conflict(_)) => bail!("User @{} already exists", user.handle),
                Err(e) => return Err(e.into()),
            }

            tracing::info!(user_id = %user.id, handle = %user.handle, "User created");
            println!("{}", user.id);
        }
        UserCommands::List { json } => {
            let users = store.list_users().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
                return Ok(());
            }

            if users.is_empty() {
                println!("No users registered. Add one with: askfeed user add --handle <HANDLE>");
                return Ok(());
            }

            for user in users {
                println!(
                    "{}  @{}  (created {})",
                    user.id,
                    user.handle,
                    format_time(user.created_at)
                );
            }
        }
    }

    Ok(())
}
