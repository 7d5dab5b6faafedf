//! Sqlite-backed [`HttpCache`] (C1): a single-file embedded store keyed by the
//! full request URL, written with an atomic `REPLACE INTO`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::cache::{CacheEntry, HttpCache};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::backend::StorageError;

pub struct SqliteHttpCache {
    pool: SqlitePool,
}

impl SqliteHttpCache {
    pub async fn connect(dsn: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new().max_connections(5).connect(dsn).await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS http_cache (
                url TEXT PRIMARY KEY,
                etag TEXT,
                last_modified TEXT,
                body TEXT NOT NULL,
                fetched_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl HttpCache for SqliteHttpCache {
    async fn get(&self, url: &str) -> common::Result<Option<CacheEntry>> {
        let row = sqlx::query("SELECT etag, last_modified, body, fetched_at FROM http_cache WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let Some(row) = row else { return Ok(None) };
        let fetched_at: String = row.get("fetched_at");
        let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(CacheEntry {
            etag: row.get("etag"),
            last_modified: row.get("last_modified"),
            body: row.get("body"),
            fetched_at,
        }))
    }

    async fn set(
        &self,
        url: &str,
        etag: Option<String>,
        last_modified: Option<String>,
        body: String,
        fetched_at: DateTime<Utc>,
    ) -> common::Result<()> {
        sqlx::query(
            r#"
            REPLACE INTO http_cache (url, etag, last_modified, body, fetched_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(url)
        .bind(etag)
        .bind(last_modified)
        .bind(body)
        .bind(fetched_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = SqliteHttpCache::connect("sqlite::memory:").await.unwrap();
        cache
            .set("https://api.github.com/x", Some("\"v1\"".to_string()), None, "body".to_string(), Utc::now())
            .await
            .unwrap();

        let entry = cache.get("https://api.github.com/x").await.unwrap().unwrap();
        assert_eq!(entry.etag.as_deref(), Some("\"v1\""));
        assert_eq!(entry.body, "body");
    }

    #[tokio::test]
    async fn missing_url_returns_none() {
        let cache = SqliteHttpCache::connect("sqlite::memory:").await.unwrap();
        assert!(cache.get("https://api.github.com/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_replaces_prior_entry_atomically() {
        let cache = SqliteHttpCache::connect("sqlite::memory:").await.unwrap();
        cache
            .set("https://api.github.com/x", Some("\"v1\"".to_string()), None, "first".to_string(), Utc::now())
            .await
            .unwrap();
        cache
            .set("https://api.github.com/x", Some("\"v2\"".to_string()), None, "second".to_string(), Utc::now())
            .await
            .unwrap();

        let entry = cache.get("https://api.github.com/x").await.unwrap().unwrap();
        assert_eq!(entry.etag.as_deref(), Some("\"v2\""));
        assert_eq!(entry.body, "second");
    }
}
