use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use super::schema::Database;
use crate::cache::KvStore;

/// SQLite-backed `KvStore` over the `kv_cache` table.
///
/// Expiry is lazy: expired rows are treated as missing on read and deleted
/// opportunistically. This backs the daily LLM usage counter and the
/// latest-digest cache when no external store is wired in.
#[async_trait]
impl KvStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String, Option<i64>)> =
            sqlx::query_as("SELECT value, expires_at FROM kv_cache WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        let Some((value, expires_at)) = row else {
            return Ok(None);
        };

        let now = Utc::now().timestamp();
        if expires_at.map(|t| t <= now).unwrap_or(false) {
            sqlx::query("DELETE FROM kv_cache WHERE key = ?")
                .bind(key)
                .execute(&self.pool)
                .await?;
            return Ok(None);
        }

        Ok(Some(value))
    }

    async fn put(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let expires_at = ttl_seconds.map(|ttl| Utc::now().timestamp() + ttl as i64);
        sqlx::query(
            r#"
            INSERT INTO kv_cache (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
        "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
