//! Error types

use thiserror::Error;

/// Top-level error type shared across the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("GitHub error: {0}")]
    GitHub(String),

    #[error("rule set error: {0}")]
    Rules(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
