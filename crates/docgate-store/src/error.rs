//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A persisted value could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Tenant schema name rejected.
    #[error("invalid tenant schema: {0:?}")]
    InvalidSchema(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding store state was poisoned by a panicking thread.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking store task failed to complete.
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl From<docgate_core::CoreError> for StoreError {
    fn from(e: docgate_core::CoreError) -> Self {
        StoreError::InvalidData(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
