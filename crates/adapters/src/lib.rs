//! askfeed adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `feed`: twitterapi.io client and a scripted stub
//! - `media`: OpenRouter vision adapter and a stub
//! - `store`: SQLite and in-memory stores

mod store_memory;
mod store_sqlite;

pub mod feed_api;
pub mod media;

/// Re-exports for feed adapters
pub mod feed {
    pub use crate::feed_api::{StubFeedSource, TwitterApiFeed};
}

/// Re-exports for store adapters
pub mod store {
    pub use crate::store_memory::InMemoryStore;
    pub use crate::store_sqlite::SqliteStore;
}
