use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process has the
    /// database locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks to release
        // before returning SQLITE_BUSY. Using pragma() ensures all connections
        // in the pool inherit this setting.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        // SQLite is single-writer; collection and digest runs are short-lived
        // triggered tasks, so a small pool covers peak concurrent readers.
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            let error_string = e.to_string().to_lowercase();
            if error_string.contains("database is locked")
                || error_string.contains("database table is locked")
                || error_string.contains("sqlite_busy")
                || error_string.contains("sqlite_locked")
            {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All migrations use `IF NOT EXISTS` for idempotency, so re-running on
    /// an existing database is a no-op.
    async fn migrate(&self) -> Result<()> {
        // Enable foreign keys (per-connection setting, outside the transaction)
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;

        // Articles: the persistent record for every collected item.
        // url_hash carries the UNIQUE index used for dedup across all
        // statuses, including soft-deleted rows awaiting retention.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                url_hash TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                source_id TEXT NOT NULL,
                feed_category TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                tags TEXT NOT NULL DEFAULT '[]',
                summary TEXT,
                insight TEXT,
                community_score REAL NOT NULL DEFAULT 0,
                llm_score REAL NOT NULL DEFAULT 0,
                final_score REAL NOT NULL DEFAULT 0,
                published_at INTEGER NOT NULL,
                collected_at INTEGER NOT NULL,
                archived_at INTEGER,
                thumbnail_url TEXT
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Digest snapshots, keyed "{date}-{edition}"; replaced on re-run.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS digests (
                id TEXT PRIMARY KEY,
                date TEXT NOT NULL,
                edition TEXT NOT NULL,
                tech_top_ids TEXT NOT NULL,
                world_summary TEXT NOT NULL,
                world_top_ids TEXT NOT NULL,
                categories TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Per-source outcome of each collection run.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collect_logs (
                id INTEGER PRIMARY KEY,
                source_id TEXT NOT NULL,
                inserted_count INTEGER NOT NULL DEFAULT 0,
                duplicate_count INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Bookmarked articles are exempt from the age-based cleanup sweep.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bookmarks (
                article_id TEXT PRIMARY KEY REFERENCES articles(id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Key-value cache with lazy TTL expiry; backs the daily LLM usage
        // counter and the latest-digest read cache.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Indexes for the hot query paths: ranked selection at digest time,
        // per-category listings, and recent collect logs.
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_rank
             ON articles(feed_category, status, final_score DESC)",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_published ON articles(published_at DESC)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_collect_logs_created ON collect_logs(created_at DESC)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
