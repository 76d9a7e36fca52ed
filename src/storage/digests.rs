use anyhow::Result;
use std::collections::BTreeMap;

use super::schema::Database;
use super::types::{Digest, DigestRow, Edition};

impl Database {
    // ========================================================================
    // Digest Operations
    // ========================================================================

    /// Upsert a digest snapshot. Re-running compilation for the same
    /// `{date}-{edition}` key replaces the prior snapshot (same id, no
    /// duplicate rows).
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_digest(
        &self,
        id: &str,
        date: &str,
        edition: Edition,
        tech_top_ids: &[String],
        world_summary: &str,
        world_top_ids: &[String],
        categories: &BTreeMap<String, Vec<String>>,
        created_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO digests
                (id, date, edition, tech_top_ids, world_summary, world_top_ids, categories, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(id)
        .bind(date)
        .bind(edition.as_str())
        .bind(serde_json::to_string(tech_top_ids)?)
        .bind(world_summary)
        .bind(serde_json::to_string(world_top_ids)?)
        .bind(serde_json::to_string(categories)?)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_digest(&self, id: &str) -> Result<Option<Digest>> {
        let row: Option<DigestRow> = sqlx::query_as("SELECT * FROM digests WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(DigestRow::into_digest))
    }

    pub async fn get_latest_digest(&self) -> Result<Option<Digest>> {
        let row: Option<DigestRow> =
            sqlx::query_as("SELECT * FROM digests ORDER BY created_at DESC, id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(DigestRow::into_digest))
    }

    pub async fn get_digests_by_date(&self, date: &str) -> Result<Vec<Digest>> {
        let rows: Vec<DigestRow> =
            sqlx::query_as("SELECT * FROM digests WHERE date = ? ORDER BY edition DESC")
                .bind(date)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(DigestRow::into_digest).collect())
    }

    pub async fn count_digests(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM digests")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
