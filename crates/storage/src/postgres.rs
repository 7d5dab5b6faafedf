//! Postgres-backed storage.

use async_trait::async_trait;
use common::models::{ContributionEvent, Score};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::backend::{StorageBackend, StorageError};

pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub async fn connect(dsn: &str) -> Result<Self, StorageError> {
        info!("connecting to postgres...");
        let pool = PgPoolOptions::new().max_connections(10).connect(dsn).await?;
        info!("postgres connected");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StorageBackend for PostgresBackend {
    async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                repo_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                lines_added BIGINT NOT NULL DEFAULT 0,
                lines_removed BIGINT NOT NULL DEFAULT 0,
                source_host TEXT NOT NULL DEFAULT 'github.com'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scores (
                user_id TEXT NOT NULL,
                dimension TEXT NOT NULL,
                value DOUBLE PRECISION NOT NULL,
                window TEXT NOT NULL DEFAULT 'all',
                generated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (user_id, dimension, window)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_events(&self, events: &[ContributionEvent]) -> Result<u64, StorageError> {
        let mut affected = 0u64;
        for event in events {
            let result = sqlx::query(
                r#"
                INSERT INTO events (id, kind, repo_id, user_id, created_at, lines_added, lines_removed)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(&event.id)
            .bind(event.kind.as_str())
            .bind(&event.repo_id)
            .bind(&event.user_id)
            .bind(event.created_at)
            .bind(event.lines_added as i64)
            .bind(event.lines_removed as i64)
            .execute(&self.pool)
            .await?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    async fn save_scores(&self, scores: &[Score]) -> Result<u64, StorageError> {
        let mut affected = 0u64;
        for score in scores {
            let result = sqlx::query(
                r#"
                INSERT INTO scores (user_id, dimension, value, window, generated_at)
                VALUES ($1, $2, $3, $4, now())
                ON CONFLICT (user_id, dimension, window)
                DO UPDATE SET value = EXCLUDED.value, generated_at = now()
                "#,
            )
            .bind(&score.subject_id)
            .bind(&score.dimension)
            .bind(score.value)
            .bind(&score.window)
            .execute(&self.pool)
            .await?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Sum of all dimension scores for `subject_id` in the `"all"` window — the
/// "latest total" the update-quota tier diffs against.
pub async fn get_latest_total(pool: &PgPool, subject_id: &str) -> Result<f64, StorageError> {
    let row = sqlx::query(
        "SELECT COALESCE(SUM(value), 0.0) AS total FROM scores WHERE user_id = $1 AND window = 'all'",
    )
    .bind(subject_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get::<f64, _>("total"))
}
