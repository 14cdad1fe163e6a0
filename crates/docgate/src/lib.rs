//! # docgate
//!
//! The authorization core of a multi-tenant document-sharing platform.
//!
//! ## Overview
//!
//! docgate decides, for every object identified by a hierarchical GNS path,
//! whether a subject may perform an operation, who owns the object, and which
//! principals a user may share with or administer:
//!
//! - **Ownership**: owners of a path implicitly own its whole subtree
//! - **Custom permissions**: allow/deny overlays per accessor, with expiry
//! - **Scope**: the users and departments a user may share with, derived from
//!   sharing strategies and the org chart
//! - **Access control**: one predicate per file operation, plus cleanup after
//!   destructive operations
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docgate::{AccessOp, Authz, AuthzConfig, Services, Subject};
//! use docgate::core::GnsPath;
//! # use docgate::{PermissionEvaluator, FileLockService};
//!
//! async fn example(
//!     evaluator: Arc<dyn PermissionEvaluator>,
//!     locks: Arc<dyn FileLockService>,
//! ) {
//!     let config = AuthzConfig::default();
//!     let authz = Authz::sqlite("authz.db", Services::new(evaluator, locks), config);
//!
//!     let subject = Subject::user("u1");
//!     let path = GnsPath::from("gns://lib/reports");
//!     authz.access().check_access(&subject, &path, AccessOp::RecycleDir).await.unwrap();
//!     // ... perform the recycle ...
//!     authz.access().on_access_finished(AccessOp::RecycleDir, &path).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `docgate::core` - Paths, principals and records
//! - `docgate::store` - Store traits, SQLite and in-memory backends
//! - `docgate::scope` - Scope resolution

pub mod access;
pub mod authz;
pub mod config;
pub mod error;
pub mod services;
pub mod sweep;

// Re-export component crates
pub use docgate_core as core;
pub use docgate_scope as scope;
pub use docgate_store as store;

// Re-export main types for convenience
pub use access::{AccessController, AccessOp, Cleanup, CleanupReport, Predicate};
pub use authz::Authz;
pub use config::{AuthzConfig, DEFAULT_DATA_EXCHANGE_PRINCIPAL};
pub use error::{AuthzError, Result};
pub use services::{
    CrawlStrategySource, EvalStatus, FileLockService, NoCrawlStrategies, PermissionEvaluator,
    Services, Subject, VisitorType,
};
pub use sweep::{ExpirySweeper, SweepReport};
