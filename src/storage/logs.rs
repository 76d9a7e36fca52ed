use anyhow::Result;

use super::schema::Database;
use super::types::CollectLog;

impl Database {
    // ========================================================================
    // Collect Log Operations
    // ========================================================================

    /// Record the outcome of one source within a collection run.
    pub async fn log_collection(
        &self,
        source_id: &str,
        inserted: i64,
        duplicates: i64,
        error_message: Option<&str>,
        now: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO collect_logs (source_id, inserted_count, duplicate_count, error_message, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(source_id)
        .bind(inserted)
        .bind(duplicates)
        .bind(error_message)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The most recent collect log rows, newest first.
    pub async fn recent_collect_logs(&self, limit: i64) -> Result<Vec<CollectLog>> {
        let rows: Vec<CollectLog> = sqlx::query_as(
            "SELECT * FROM collect_logs ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Total articles inserted by collection runs since the given time.
    pub async fn collected_since(&self, since: i64) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(inserted_count), 0) FROM collect_logs WHERE created_at >= ?",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
