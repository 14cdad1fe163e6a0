//! # docgate scope
//!
//! Sharing-scope resolution: which users and departments a given user may
//! share documents with or administer.
//!
//! ## Overview
//!
//! Scope is derived from sharing-strategy configuration. A strategy names
//! sharers (users or departments) and a scope (the principals those sharers
//! may act upon). Users not named directly inherit the strategy of the most
//! specific department above them; global toggles supply a default scope.
//!
//! ## Key Types
//!
//! - [`ScopeEngine`] - Computes scopes and answers membership questions
//! - [`ScopeConfig`] - Share-limit and superimpose flags
//! - [`OrgChart`] - A loaded slice of the department tree
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docgate_scope::{ScopeConfig, ScopeEngine};
//! use docgate_store::MemoryStore;
//!
//! async fn example() {
//!     let engine = ScopeEngine::new(Arc::new(MemoryStore::new()), ScopeConfig::default());
//!     let scope = engine.get_user_perm_scope_infos(&"u1".into()).await.unwrap();
//!     let in_scope = engine.check_usr_in_perm_scope(&"u1".into(), &"u2".into()).await.unwrap();
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod hierarchy;

pub use config::ScopeConfig;
pub use engine::ScopeEngine;
pub use error::{Result, ScopeError};
pub use hierarchy::{ancestor_closure, OrgChart};
