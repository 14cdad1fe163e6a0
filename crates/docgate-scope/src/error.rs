//! Error types for scope resolution.

use thiserror::Error;

use docgate_store::StoreError;

/// Errors that can occur while resolving a scope.
///
/// Missing strategies, departments or memberships are never errors; they
/// simply contribute nothing to the scope.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// Reading strategies or the directory failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for scope operations.
pub type Result<T> = std::result::Result<T, ScopeError>;
