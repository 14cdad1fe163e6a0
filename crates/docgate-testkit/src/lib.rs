//! # docgate testkit
//!
//! Testing utilities for docgate.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fakes**: Recording implementations of the external permission
//!   evaluator, lock service and crawl strategy source
//! - **Fixtures**: A seeded org chart and an [`Authz`](docgate::Authz)
//!   wired to the fakes
//! - **Generators**: Proptest strategies for paths and records
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use docgate::{AccessOp, AuthzConfig, Subject};
//! use docgate_core::{GnsPath, PermBits};
//! use docgate_testkit::fixtures::TestFixture;
//!
//! async fn example() {
//!     let fixture = TestFixture::memory(AuthzConfig::default());
//!     fixture.evaluator.grant("u1", "/lib", PermBits::READ);
//!
//!     let subject = Subject::user("u1");
//!     let path = GnsPath::from("/lib/a.txt");
//!     fixture.authz.access().check_access(&subject, &path, AccessOp::GetFile).await.unwrap();
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use docgate_testkit::generators::gns_path;
//!
//! proptest! {
//!     #[test]
//!     fn depth_matches_ancestors(path in gns_path(6)) {
//!         prop_assert_eq!(path.ancestors().len(), path.depth());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    seed_org_chart, EvalCall, LockCall, RecordingEvaluator, RecordingLocks,
    StaticCrawlStrategies, TestFixture,
};
pub use generators::{custom_perm_record, dense_path, gns_path, owner_record};
