//! Error types for the authorization core.

use docgate_core::{GnsPath, PrincipalId};
use docgate_scope::ScopeError;
use docgate_store::StoreError;
use thiserror::Error;

use crate::access::AccessOp;
use crate::services::EvalStatus;

/// Errors that can occur during authorization.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// A predicate evaluated false.
    #[error("access denied: {subject} may not {op} {path}: {reason}")]
    AccessDenied {
        op: AccessOp,
        path: GnsPath,
        subject: PrincipalId,
        reason: String,
    },

    /// Reading or previewing file content was refused by the evaluator.
    #[error("download denied: {subject} may not {op} {path} ({status})")]
    DownloadDenied {
        op: AccessOp,
        path: GnsPath,
        subject: PrincipalId,
        status: EvalStatus,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Scope resolution error.
    #[error("scope error: {0}")]
    Scope(#[from] ScopeError),

    /// The permission evaluator failed.
    #[error("permission evaluator error: {0}")]
    Evaluator(String),

    /// The file-lock service failed.
    #[error("file lock service error: {0}")]
    LockService(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AuthzError {
    /// Whether this is an authorization failure rather than a service error.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. } | Self::DownloadDenied { .. })
    }
}

/// Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;
