use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use std::time::Duration;
use tracing::instrument;

use super::cache::{CacheEntry, Fingerprint, ResponseStore};

/// Row of the shared `response_cache` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ResponseCacheRow {
    fingerprint: String,
    payload: JsonValue,
    stored_at: DateTime<Utc>,
}

/// Response store shared by every gateway instance pointing at the same database.
#[derive(Clone)]
pub struct PostgresResponseStore {
    pool: PgPool,
}

impl PostgresResponseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .context("failed to connect to response cache database")?;
        Ok(Self::new(pool))
    }

    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS response_cache (
                fingerprint TEXT PRIMARY KEY,
                payload JSONB NOT NULL,
                stored_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create response_cache table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS response_cache_stored_at_idx
            ON response_cache (stored_at)
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create response_cache index")?;

        Ok(())
    }
}

#[async_trait]
impl ResponseStore for PostgresResponseStore {
    #[instrument(skip(self))]
    async fn load(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
        let row = sqlx::query_as::<_, ResponseCacheRow>(
            r#"
            SELECT fingerprint, payload, stored_at
            FROM response_cache
            WHERE fingerprint = $1
            "#,
        )
        .bind(fingerprint.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("failed to read cached response")?;

        Ok(row.map(|row| CacheEntry {
            fingerprint: Fingerprint::from_raw(row.fingerprint),
            payload: row.payload,
            stored_at: row.stored_at,
        }))
    }

    #[instrument(skip(self, entry), fields(fingerprint = %entry.fingerprint))]
    async fn save(&self, entry: CacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO response_cache (fingerprint, payload, stored_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (fingerprint)
            DO UPDATE
                SET payload = EXCLUDED.payload,
                    stored_at = EXCLUDED.stored_at
            "#,
        )
        .bind(entry.fingerprint.as_str())
        .bind(Json(entry.payload))
        .bind(entry.stored_at)
        .execute(&self.pool)
        .await
        .context("failed to write cached response")?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn purge_stored_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM response_cache WHERE stored_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("failed to purge expired responses")?;

        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }

    async fn len(&self) -> Result<usize> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM response_cache")
            .fetch_one(&self.pool)
            .await
            .context("failed to count cached responses")?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}
