//! SQLite store implementation

use askfeed_domain::{
    Author, AuthorStore, FollowStore, FollowingEntry, IngestRun, Post, PostStore, PostWithAuthor,
    RunLedger, RunOutcome, RunProgress, RunStatus, StoreError, User, UserId, UserStore,
};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions, sqlite::SqliteRow};
use std::path::Path;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Fixed-width UTC timestamps so that text comparison orders chronologically
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z");

const RUN_COLUMNS: &str = "id, user_id, started_at, completed_at, status, cursor, \
     fetched_count, retried, rate_limit_hits, err_text";

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn format_ts(ts: OffsetDateTime) -> Result<String, StoreError> {
    ts.to_offset(UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn parse_ts(raw: &str) -> Result<OffsetDateTime, StoreError> {
    PrimitiveDateTime::parse(raw, TIMESTAMP_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| StoreError::Serialization(format!("{}: {}", raw, e)))
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<OffsetDateTime>, StoreError> {
    raw.as_deref().map(parse_ts).transpose()
}

fn parse_user_id(raw: &str) -> Result<UserId, StoreError> {
    raw.parse()
        .map_err(|e: uuid::Error| StoreError::Serialization(e.to_string()))
}

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(db_err)
}

fn run_from_row(row: &SqliteRow) -> Result<IngestRun, StoreError> {
    let status: String = get(row, "status")?;
    Ok(IngestRun {
        id: get(row, "id")?,
        user_id: parse_user_id(&get::<String>(row, "user_id")?)?,
        started_at: parse_ts(&get::<String>(row, "started_at")?)?,
        completed_at: parse_opt_ts(get(row, "completed_at")?)?,
        status: status.parse::<RunStatus>().map_err(StoreError::Serialization)?,
        cursor: get(row, "cursor")?,
        fetched_count: get::<i64>(row, "fetched_count")? as u32,
        retried: get::<i64>(row, "retried")? as u32,
        rate_limit_hits: get::<i64>(row, "rate_limit_hits")? as u32,
        err_text: get(row, "err_text")?,
    })
}

/// SQLite-backed store for users, runs, authors, relationships and posts
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database file and apply migrations
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                handle TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS authors (
                id INTEGER PRIMARY KEY,
                handle TEXT NOT NULL,
                display_name TEXT,
                last_seen_at TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS user_following (
                user_id TEXT NOT NULL,
                author_id INTEGER NOT NULL,
                last_checked_at TEXT NOT NULL,
                PRIMARY KEY (user_id, author_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                user_id TEXT NOT NULL,
                post_id INTEGER NOT NULL,
                author_id INTEGER NOT NULL,
                published_at TEXT NOT NULL,
                url TEXT NOT NULL,
                text TEXT NOT NULL,
                conversation_id INTEGER,
                ingested_at TEXT NOT NULL,
                first_visible_at TEXT NOT NULL,
                edited_seen INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, post_id)
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_posts_published
            ON posts(user_id, published_at)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ingest_runs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                status TEXT NOT NULL,
                cursor INTEGER NOT NULL DEFAULT 0,
                fetched_count INTEGER NOT NULL DEFAULT 0,
                retried INTEGER NOT NULL DEFAULT 0,
                rate_limit_hits INTEGER NOT NULL DEFAULT 0,
                err_text TEXT
            )
            "#,
            // At most one active run per user
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_ingest_runs_active
            ON ingest_runs(user_id) WHERE completed_at IS NULL
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_ingest_runs_completed
            ON ingest_runs(user_id, completed_at)
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }

        Ok(())
    }

    async fn active_run_id(&self, user_id: UserId) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT id FROM ingest_runs WHERE user_id = ? AND completed_at IS NULL")
                .bind(user_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(|(id,)| id))
    }

    async fn run_exists(&self, run_id: &str) -> Result<bool, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ingest_runs WHERE id = ?")
            .bind(run_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count.0 > 0)
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO users (id, handle, created_at) VALUES (?, ?, ?)")
            .bind(user.id.to_string())
            .bind(&user.handle)
            .bind(format_ts(user.created_at)?)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!("user @{} already exists", user.handle))
                } else {
                    db_err(e)
                }
            })?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT id, handle, created_at FROM users WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        row.map(|(id, handle, created_at)| {
            Ok(User {
                id: parse_user_id(&id)?,
                handle,
                created_at: parse_ts(&created_at)?,
            })
        })
        .transpose()
    }

    async fn get_user_by_handle(&self, handle: &str) -> Result<Option<User>, StoreError> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT id, handle, created_at FROM users WHERE handle = ?")
                .bind(handle)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        row.map(|(id, handle, created_at)| {
            Ok(User {
                id: parse_user_id(&id)?,
                handle,
                created_at: parse_ts(&created_at)?,
            })
        })
        .transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT id, handle, created_at FROM users ORDER BY created_at, handle")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        rows.into_iter()
            .map(|(id, handle, created_at)| {
                Ok(User {
                    id: parse_user_id(&id)?,
                    handle,
                    created_at: parse_ts(&created_at)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl RunLedger for SqliteStore {
    async fn create_run(&self, run: &IngestRun) -> Result<(), StoreError> {
        let user_id = run.user_id.to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO ingest_runs
            (id, user_id, started_at, completed_at, status, cursor, fetched_count, retried, rate_limit_hits, err_text)
            SELECT ?, ?, ?, NULL, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM ingest_runs WHERE user_id = ? AND completed_at IS NULL
            )
            "#,
        )
        .bind(&run.id)
        .bind(&user_id)
        .bind(format_ts(run.started_at)?)
        .bind(run.status.as_str())
        .bind(run.cursor)
        .bind(i64::from(run.fetched_count))
        .bind(i64::from(run.retried))
        .bind(i64::from(run.rate_limit_hits))
        .bind(&run.err_text)
        .bind(&user_id)
        .execute(&self.pool)
        .await;

        let claimed = match result {
            Ok(done) => done.rows_affected() > 0,
            Err(e) if is_unique_violation(&e) => false,
            Err(e) => return Err(db_err(e)),
        };

        if claimed {
            return Ok(());
        }

        let run_id = self.active_run_id(run.user_id).await?.unwrap_or_default();
        Err(StoreError::RunAlreadyActive {
            user_id: run.user_id,
            run_id,
        })
    }

    async fn current_run(&self, user_id: UserId) -> Result<Option<IngestRun>, StoreError> {
        let sql = format!(
            "SELECT {} FROM ingest_runs WHERE user_id = ? AND completed_at IS NULL",
            RUN_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(run_from_row).transpose()
    }

    async fn recent_runs(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<IngestRun>, StoreError> {
        let sql = format!(
            "SELECT {} FROM ingest_runs WHERE user_id = ? AND completed_at IS NOT NULL \
             ORDER BY completed_at DESC, id DESC LIMIT ?",
            RUN_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(run_from_row).collect()
    }

    async fn last_sync_at(&self, user_id: UserId) -> Result<Option<OffsetDateTime>, StoreError> {
        let row: (Option<String>,) =
            sqlx::query_as("SELECT MAX(completed_at) FROM ingest_runs WHERE user_id = ?")
                .bind(user_id.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;

        parse_opt_ts(row.0)
    }

    async fn update_progress(
        &self,
        run_id: &str,
        progress: &RunProgress,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE ingest_runs SET
                cursor = MAX(cursor, ?),
                fetched_count = ?,
                retried = ?,
                rate_limit_hits = ?
            WHERE id = ? AND completed_at IS NULL
            "#,
        )
        .bind(progress.cursor)
        .bind(i64::from(progress.fetched))
        .bind(i64::from(progress.retried))
        .bind(i64::from(progress.rate_limit_hits))
        .bind(run_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("active run {}", run_id)));
        }
        Ok(())
    }

    async fn finalize_run(&self, run_id: &str, outcome: &RunOutcome) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE ingest_runs SET
                completed_at = ?,
                status = ?,
                cursor = MAX(cursor, ?),
                fetched_count = ?,
                retried = ?,
                rate_limit_hits = ?,
                err_text = ?
            WHERE id = ? AND completed_at IS NULL
            "#,
        )
        .bind(format_ts(outcome.completed_at)?)
        .bind(outcome.status.as_str())
        .bind(outcome.progress.cursor)
        .bind(i64::from(outcome.progress.fetched))
        .bind(i64::from(outcome.progress.retried))
        .bind(i64::from(outcome.progress.rate_limit_hits))
        .bind(&outcome.err_text)
        .bind(run_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        if self.run_exists(run_id).await? {
            Err(StoreError::Conflict(format!("run {} already finalized", run_id)))
        } else {
            Err(StoreError::NotFound(format!("run {}", run_id)))
        }
    }

    async fn reconcile_stale_runs(
        &self,
        started_before: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE ingest_runs SET
                completed_at = ?,
                status = 'error',
                err_text = 'abandoned'
            WHERE completed_at IS NULL AND started_at < ?
            "#,
        )
        .bind(format_ts(now)?)
        .bind(format_ts(started_before)?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AuthorStore for SqliteStore {
    async fn upsert_author(&self, author: &Author) -> Result<(), StoreError> {
        let last_seen_at = author.last_seen_at.map(format_ts).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO authors (id, handle, display_name, last_seen_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                handle = excluded.handle,
                display_name = excluded.display_name,
                last_seen_at = COALESCE(excluded.last_seen_at, authors.last_seen_at)
            "#,
        )
        .bind(author.id)
        .bind(&author.handle)
        .bind(&author.display_name)
        .bind(last_seen_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_author(&self, id: i64) -> Result<Option<Author>, StoreError> {
        let row: Option<(i64, String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT id, handle, display_name, last_seen_at FROM authors WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|(id, handle, display_name, last_seen_at)| {
            Ok(Author {
                id,
                handle,
                display_name,
                last_seen_at: parse_opt_ts(last_seen_at)?,
            })
        })
        .transpose()
    }

    async fn update_last_seen(&self, id: i64, seen_at: OffsetDateTime) -> Result<(), StoreError> {
        let seen_at = format_ts(seen_at)?;
        let result = sqlx::query(
            r#"
            UPDATE authors SET
                last_seen_at = CASE
                    WHEN last_seen_at IS NULL OR last_seen_at < ? THEN ?
                    ELSE last_seen_at
                END
            WHERE id = ?
            "#,
        )
        .bind(&seen_at)
        .bind(&seen_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("author {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl FollowStore for SqliteStore {
    async fn upsert_following(
        &self,
        user_id: UserId,
        author_id: i64,
        checked_at: OffsetDateTime,
        limit: usize,
    ) -> Result<bool, StoreError> {
        let user_id = user_id.to_string();
        let checked_at = format_ts(checked_at)?;

        let refreshed = sqlx::query(
            "UPDATE user_following SET last_checked_at = ? WHERE user_id = ? AND author_id = ?",
        )
        .bind(&checked_at)
        .bind(&user_id)
        .bind(author_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if refreshed.rows_affected() > 0 {
            return Ok(true);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO user_following (user_id, author_id, last_checked_at)
            SELECT ?, ?, ?
            WHERE (SELECT COUNT(*) FROM user_following WHERE user_id = ?) < ?
            ON CONFLICT(user_id, author_id) DO UPDATE SET
                last_checked_at = excluded.last_checked_at
            "#,
        )
        .bind(&user_id)
        .bind(author_id)
        .bind(&checked_at)
        .bind(&user_id)
        .bind(limit as i64)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(inserted.rows_affected() > 0)
    }

    async fn following(&self, user_id: UserId) -> Result<Vec<FollowingEntry>, StoreError> {
        let rows: Vec<(i64, String, Option<String>, Option<String>, String)> = sqlx::query_as(
            r#"
            SELECT f.author_id, COALESCE(a.handle, ''), a.display_name, a.last_seen_at,
                   f.last_checked_at
            FROM user_following f
            LEFT JOIN authors a ON a.id = f.author_id
            WHERE f.user_id = ?
            ORDER BY f.rowid
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(
                |(author_id, handle, display_name, last_seen_at, last_checked_at)| {
                    Ok(FollowingEntry {
                        author_id,
                        handle,
                        display_name,
                        last_seen_at: parse_opt_ts(last_seen_at)?,
                        last_checked_at: Some(parse_ts(&last_checked_at)?),
                    })
                },
            )
            .collect()
    }

    async fn following_count(&self, user_id: UserId) -> Result<usize, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_following WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count.0 as usize)
    }
}

#[async_trait]
impl PostStore for SqliteStore {
    async fn post_exists(&self, user_id: UserId, post_id: i64) -> Result<bool, StoreError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM posts WHERE user_id = ? AND post_id = ?")
                .bind(user_id.to_string())
                .bind(post_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(count.0 > 0)
    }

    async fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO posts
            (user_id, post_id, author_id, published_at, url, text, conversation_id,
             ingested_at, first_visible_at, edited_seen)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post.user_id.to_string())
        .bind(post.post_id)
        .bind(post.author_id)
        .bind(format_ts(post.published_at)?)
        .bind(&post.url)
        .bind(&post.text)
        .bind(post.conversation_id)
        .bind(format_ts(post.ingested_at)?)
        .bind(format_ts(post.first_visible_at)?)
        .bind(post.edited_seen)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("post {} already stored", post.post_id))
            } else {
                db_err(e)
            }
        })?;

        Ok(())
    }

    async fn posts_in_range(
        &self,
        user_id: UserId,
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<PostWithAuthor>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT p.user_id, p.post_id, p.author_id, p.published_at, p.url, p.text,
                   p.conversation_id, p.ingested_at, p.first_visible_at, p.edited_seen,
                   a.handle, a.display_name
            FROM posts p
            JOIN authors a ON a.id = p.author_id
            WHERE p.user_id = ? AND p.published_at >= ? AND p.published_at <= ?
            ORDER BY p.published_at ASC, p.post_id ASC
            LIMIT ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(format_ts(from)?)
        .bind(format_ts(to)?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                Ok(PostWithAuthor {
                    post: Post {
                        user_id: parse_user_id(&get::<String>(row, "user_id")?)?,
                        post_id: get(row, "post_id")?,
                        author_id: get(row, "author_id")?,
                        published_at: parse_ts(&get::<String>(row, "published_at")?)?,
                        url: get(row, "url")?,
                        text: get(row, "text")?,
                        conversation_id: get(row, "conversation_id")?,
                        ingested_at: parse_ts(&get::<String>(row, "ingested_at")?)?,
                        first_visible_at: parse_ts(&get::<String>(row, "first_visible_at")?)?,
                        edited_seen: get(row, "edited_seen")?,
                    },
                    handle: get(row, "handle")?,
                    display_name: get(row, "display_name")?,
                })
            })
            .collect()
    }
}
