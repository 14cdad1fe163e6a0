//! # docgate core
//!
//! Pure types for the docgate authorization core: GNS paths, principals,
//! ownership records, custom permission records and sharing-scope records.
//!
//! This crate contains no I/O and no storage. It is shared by the store,
//! the scope engine and the access dispatcher.
//!
//! ## Key Types
//!
//! - [`GnsPath`] - Hierarchical object identifier and its ancestor chain
//! - [`OwnerRecord`] - Who owns which path
//! - [`CustomPermRecord`] - Allow/deny overlay with expiry
//! - [`PermBits`] - Permission bitmask
//! - [`ScopeMap`] - A user's computed sharing scope

pub mod error;
pub mod owner;
pub mod path;
pub mod perm;
pub mod scope;
pub mod types;

pub use error::CoreError;
pub use owner::{most_specific_owners, OwnerRecord};
pub use path::GnsPath;
pub use perm::{CustomPermRecord, PermBits, MISSING_ID, NEVER_EXPIRES};
pub use scope::{
    DefaultScopeToggle, Department, OrgInfo, ScopeKey, ScopeMap, ScopeObject, StrategyRecord,
    StrategyRole,
};
pub use types::{AccessorType, PermKind, PermSource, PrincipalId, PrincipalType};
