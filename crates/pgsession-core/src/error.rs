//! Error types for pgsession

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Construction errors
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // Session store errors
    #[error("Duplicate session ID: {0}")]
    DuplicateId(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Whether the error is a primary-key collision the host may recover from
    /// by generating a fresh session ID.
    pub fn is_duplicate_id(&self) -> bool {
        matches!(self, Error::DuplicateId(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
