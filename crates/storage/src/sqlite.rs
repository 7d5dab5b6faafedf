//! SQLite-backed storage — used for local/offline runs and tests (`sqlite:///:memory:`).

use async_trait::async_trait;
use common::models::{ContributionEvent, Score};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use crate::backend::{StorageBackend, StorageError};

pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub async fn connect(dsn: &str) -> Result<Self, StorageError> {
        info!("opening sqlite store at {}", dsn);
        let pool = SqlitePoolOptions::new().max_connections(5).connect(dsn).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                repo_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                lines_added INTEGER NOT NULL DEFAULT 0,
                lines_removed INTEGER NOT NULL DEFAULT 0,
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
                value REAL NOT NULL,
                window TEXT NOT NULL DEFAULT 'all',
                generated_at TEXT NOT NULL DEFAULT (datetime('now')),
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
                INSERT OR IGNORE INTO events (id, kind, repo_id, user_id, created_at, lines_added, lines_removed)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&event.id)
            .bind(event.kind.as_str())
            .bind(&event.repo_id)
            .bind(&event.user_id)
            .bind(event.created_at.to_rfc3339())
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
                VALUES (?, ?, ?, ?, datetime('now'))
                ON CONFLICT (user_id, dimension, window)
                DO UPDATE SET value = excluded.value, generated_at = excluded.generated_at
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn save_events_is_idempotent() {
        let backend = SqliteBackend::connect("sqlite::memory:").await.unwrap();
        backend.ensure_schema().await.unwrap();

        let events = vec![ContributionEvent {
            id: "a".to_string(),
            kind: common::models::Kind::Commit,
            repo_id: "github.com/x/y".to_string(),
            user_id: "u".to_string(),
            created_at: Utc::now(),
            lines_added: 1,
            lines_removed: 0,
        }];

        let first = backend.save_events(&events).await.unwrap();
        assert_eq!(first, 1);
        let second = backend.save_events(&events).await.unwrap();
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn save_scores_upserts_value() {
        let backend = SqliteBackend::connect("sqlite::memory:").await.unwrap();
        backend.ensure_schema().await.unwrap();

        let score = Score {
            subject_id: "u".to_string(),
            dimension: "code".to_string(),
            value: 1.0,
            window: "all".to_string(),
            metadata: Default::default(),
        };
        backend.save_scores(&[score.clone()]).await.unwrap();

        let mut updated = score.clone();
        updated.value = 5.0;
        backend.save_scores(&[updated]).await.unwrap();

        let row: (f64,) = sqlx::query_as("SELECT value FROM scores WHERE user_id = 'u' AND dimension = 'code'")
            .fetch_one(backend.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 5.0);
    }
}
