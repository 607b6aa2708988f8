//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// askfeed: per-user social feed ingestion with rate-limit aware backfill
#[derive(Parser, Debug)]
#[command(name = "askfeed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage local users
    User(UserArgs),

    /// Run an ingest for one user and wait for it to finish
    Ingest(IngestArgs),

    /// Show sync state and recent runs for a user
    Status(StatusArgs),

    /// List the authors a user follows
    Following(FollowingArgs),

    /// List ingested posts in a date range
    Posts(PostsArgs),

    /// Periodically sync every user
    Schedule(ScheduleArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommands,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a local user by feed handle
    Add {
        /// Handle on the feed platform (leading @ is ignored)
        #[arg(long)]
        handle: String,
    },

    /// List registered users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// User ID or handle
    #[arg(long)]
    pub user: String,

    /// Backfill window in hours (0 refreshes only the newest page per author)
    #[arg(long)]
    pub backfill_hours: Option<u32>,

    /// Output the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// User ID or handle
    #[arg(long)]
    pub user: String,

    /// Number of recent runs to show (1-50)
    #[arg(long)]
    pub limit: Option<u32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct FollowingArgs {
    /// User ID or handle
    #[arg(long)]
    pub user: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PostsArgs {
    /// User ID or handle
    #[arg(long)]
    pub user: String,

    /// Start of the range, RFC 3339 (default: 24 hours ago)
    #[arg(long)]
    pub from: Option<String>,

    /// End of the range, RFC 3339 (default: now)
    #[arg(long)]
    pub to: Option<String>,

    /// Maximum number of posts
    #[arg(long, default_value_t = 100)]
    pub limit: u32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Sync every user once and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
