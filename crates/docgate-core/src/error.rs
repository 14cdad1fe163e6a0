//! Error types for docgate core.

use thiserror::Error;

/// Errors raised while interpreting persisted values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown {what} code: {code}")]
    UnknownCode { what: &'static str, code: i32 },
}
