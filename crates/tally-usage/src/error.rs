//! Error types for tally-usage

use thiserror::Error;

/// Usage accounting error type
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying persistence failure
    #[error("database error: {0}")]
    Database(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
