//! # docgate store
//!
//! Storage abstraction for docgate. Provides trait-based interfaces for
//! ownership and custom-permission persistence, plus read access to sharing
//! strategies and the department directory, with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`OwnerStore`] - Ownership records and ancestor-aware ownership queries
//! - [`CustomPermStore`] - Allow/deny overlays with expiry
//! - [`StrategyStore`] / [`Directory`] - Read-only configuration used for scope resolution
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`TenantSchema`] - Validated per-tenant table prefix
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docgate_core::{GnsPath, OwnerRecord};
//! use docgate_store::{OwnerStore, SqliteStore, TenantSchema};
//!
//! async fn example() {
//!     // Open a SQLite database under the default tenant prefix
//!     let store = SqliteStore::open("authz.db", &TenantSchema::default()).unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     store.add_owner(&OwnerRecord::user("/lib/docs", "u1", "Alice", 0)).await.unwrap();
//!     assert!(store.is_owner(&GnsPath::from("/lib/docs/a.txt"), &"u1".into()).await.unwrap());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Inheritance by prefix**: ownership of a path applies to every descendant
//! - **Subtree deletes**: directory deletes match `path` and `path + "/"` prefixes only
//! - **Idempotent deletes**: deleting nothing is not an error; counts are returned
//! - **Evaluation filter**: permission lookups return allow/deny records only, never anonymous links

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod tenant;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use tenant::{TableNames, TenantSchema};
pub use traits::{
    AuthzStore, CustomPermStore, CustomPermStoreExt, Directory, DirectoryWriter, OwnerStore,
    StrategyStore, BATCH_CHUNK_SIZE,
};
