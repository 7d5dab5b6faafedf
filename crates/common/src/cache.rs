//! The HTTP cache contract (C1). Concrete storage lives in the `storage` crate; the
//! fetcher only depends on this trait so it never needs to know which backend is
//! behind it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A cached response for a single URL.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

/// Keyed store of conditional-GET metadata, content-addressed by full request URL.
///
/// Implementations must make `set` an atomic replace: concurrent readers observe
/// either the prior entry in full or the new one, never a partial write.
#[async_trait]
pub trait HttpCache: Send + Sync {
    async fn get(&self, url: &str) -> crate::Result<Option<CacheEntry>>;

    async fn set(
        &self,
        url: &str,
        etag: Option<String>,
        last_modified: Option<String>,
        body: String,
        fetched_at: DateTime<Utc>,
    ) -> crate::Result<()>;
}
