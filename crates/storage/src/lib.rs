//! Storage backends (C8) and the HTTP cache (C1): idempotent schema, upsert of
//! events and scores, multi-DSN dispatch, plus the optional update-quota tier.

pub mod backend;
pub mod http_cache;
pub mod postgres;
pub mod quota;
pub mod sqlite;

pub use backend::{open_backend, StorageBackend, StorageError};
pub use http_cache::SqliteHttpCache;
