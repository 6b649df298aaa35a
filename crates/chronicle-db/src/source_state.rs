//! Source watermark repository.
//!
//! One row per source name. `last_run` is the lower bound for the source's
//! next ingest run; it is only advanced after a run terminates cleanly.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use chronicle_core::{Error, Result, SourceState};

/// PostgreSQL watermark repository.
#[derive(Clone)]
pub struct PgSourceStateRepository {
    pool: Pool<Postgres>,
}

impl PgSourceStateRepository {
    /// Create a new watermark repository over the given pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Load the watermark for a source, if one has been recorded.
    pub async fn get(&self, source: &str) -> Result<Option<SourceState>> {
        let row = sqlx::query(
            "SELECT source, last_run, last_count, updated_at FROM source_state WHERE source = $1",
        )
        .bind(source)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| SourceState {
            source: r.get("source"),
            last_run: r.get("last_run"),
            last_count: r.get("last_count"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// Record a successful run. Creates the row on first success.
    pub async fn set(&self, source: &str, last_run: DateTime<Utc>, count: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO source_state (source, last_run, last_count)
            VALUES ($1, $2, $3)
            ON CONFLICT (source) DO UPDATE SET
                last_run = EXCLUDED.last_run,
                last_count = EXCLUDED.last_count,
                updated_at = now()
            "#,
        )
        .bind(source)
        .bind(last_run)
        .bind(count)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// All recorded watermarks, newest first.
    pub async fn list(&self) -> Result<Vec<SourceState>> {
        let rows = sqlx::query(
            "SELECT source, last_run, last_count, updated_at FROM source_state ORDER BY last_run DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| SourceState {
                source: r.get("source"),
                last_run: r.get("last_run"),
                last_count: r.get("last_count"),
                updated_at: r.get("updated_at"),
            })
            .collect())
    }
}
