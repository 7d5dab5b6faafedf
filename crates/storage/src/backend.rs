//! The storage-backend contract (C8) and DSN-prefix dispatcher.

use async_trait::async_trait;
use common::models::{ContributionEvent, Score};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),
    #[error("unsupported DSN: {0}")]
    UnsupportedDsn(String),
}

impl From<StorageError> for common::Error {
    fn from(e: StorageError) -> Self {
        common::Error::Storage(e.to_string())
    }
}

/// A durable store for contribution events and computed scores. Implementations
/// must make `save_events`/`save_scores` idempotent upserts (see spec P1).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Creates tables if they do not already exist. Safe to call on every startup.
    async fn ensure_schema(&self) -> Result<(), StorageError>;

    /// Inserts events, ignoring any whose `id` already exists. Returns the number
    /// of rows actually inserted.
    async fn save_events(&self, events: &[ContributionEvent]) -> Result<u64, StorageError>;

    /// Upserts scores keyed on `(subject_id, dimension, window)`. Returns the
    /// number of rows affected.
    async fn save_scores(&self, scores: &[Score]) -> Result<u64, StorageError>;

    async fn close(&self);
}

/// Opens a backend for `dsn`, dispatching on its scheme: `postgres(ql)://` or
/// `sqlite:///` (including `sqlite://:memory:`).
pub async fn open_backend(dsn: &str) -> Result<Box<dyn StorageBackend>, StorageError> {
    if dsn.starts_with("postgres://") || dsn.starts_with("postgresql://") {
        let backend = crate::postgres::PostgresBackend::connect(dsn).await?;
        Ok(Box::new(backend))
    } else if dsn.starts_with("sqlite://") || dsn.starts_with("sqlite:") {
        let backend = crate::sqlite::SqliteBackend::connect(dsn).await?;
        Ok(Box::new(backend))
    } else {
        Err(StorageError::UnsupportedDsn(dsn.to_string()))
    }
}
