//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: recording fakes for the external
//! services, a seeded org chart, and a fixture wiring them into [`Authz`].

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use docgate::{
    Authz, AuthzConfig, CrawlStrategySource, EvalStatus, FileLockService, PermissionEvaluator,
    Services, Subject,
};
use docgate_core::{Department, GnsPath, PermBits, PrincipalId};
use docgate_store::{AuthzStore, DirectoryWriter, MemoryStore, SqliteStore, StoreError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ─────────────────────────────────────────────────────────────────────────────
// Fakes
// ─────────────────────────────────────────────────────────────────────────────

/// One call made to [`RecordingEvaluator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalCall {
    pub subject: PrincipalId,
    pub path: GnsPath,
    pub bits: PermBits,
}

/// A permission evaluator that grants bits configured per path, inherited
/// by descendants, and records every call.
#[derive(Debug, Default)]
pub struct RecordingEvaluator {
    grants: Mutex<HashMap<(PrincipalId, GnsPath), PermBits>>,
    calls: Mutex<Vec<EvalCall>>,
}

impl RecordingEvaluator {
    /// Create an evaluator that grants nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `bits` on `path` and its subtree to `user`.
    pub fn grant(&self, user: impl Into<PrincipalId>, path: impl Into<GnsPath>, bits: PermBits) {
        let mut grants = lock(&self.grants);
        let entry = grants.entry((user.into(), path.into())).or_default();
        *entry |= bits;
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<EvalCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls so far.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl PermissionEvaluator for RecordingEvaluator {
    async fn check_permission(
        &self,
        subject: &Subject,
        path: &GnsPath,
        bits: PermBits,
    ) -> anyhow::Result<EvalStatus> {
        lock(&self.calls).push(EvalCall {
            subject: subject.id.clone(),
            path: path.clone(),
            bits,
        });

        let grants = lock(&self.grants);
        let held = path
            .ancestors()
            .into_iter()
            .filter_map(|p| grants.get(&(subject.id.clone(), p)).copied())
            .fold(PermBits::NONE, |acc, b| acc | b);

        Ok(if held.contains(bits) {
            EvalStatus::Granted
        } else {
            EvalStatus::Denied
        })
    }
}

/// One call made to [`RecordingLocks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockCall {
    Delete(GnsPath),
    DeleteSubtree(GnsPath),
}

/// A lock service that records releases.
#[derive(Debug, Default)]
pub struct RecordingLocks {
    calls: Mutex<Vec<LockCall>>,
}

impl RecordingLocks {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<LockCall> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl FileLockService for RecordingLocks {
    async fn delete(&self, path: &GnsPath) -> anyhow::Result<()> {
        lock(&self.calls).push(LockCall::Delete(path.clone()));
        Ok(())
    }

    async fn delete_subtree(&self, path: &GnsPath) -> anyhow::Result<()> {
        lock(&self.calls).push(LockCall::DeleteSubtree(path.clone()));
        Ok(())
    }
}

/// A crawl strategy source backed by an explicit set of `(user, path)`
/// pairs. A pair covers the path's subtree.
#[derive(Debug, Default)]
pub struct StaticCrawlStrategies {
    entries: Mutex<HashSet<(PrincipalId, GnsPath)>>,
}

impl StaticCrawlStrategies {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `user` crawl `path` and its subtree.
    pub fn allow(&self, user: impl Into<PrincipalId>, path: impl Into<GnsPath>) {
        lock(&self.entries).insert((user.into(), path.into()));
    }
}

#[async_trait]
impl CrawlStrategySource for StaticCrawlStrategies {
    async fn has_crawl_strategy(
        &self,
        user_id: &PrincipalId,
        path: &GnsPath,
    ) -> anyhow::Result<bool> {
        let entries = lock(&self.entries);
        Ok(path
            .ancestors()
            .into_iter()
            .any(|p| entries.contains(&(user_id.clone(), p))))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Org chart
// ─────────────────────────────────────────────────────────────────────────────

/// Seed a small org chart:
///
/// ```text
/// D0 (org "Acme", priority 1)
/// └── D1
///     └── D2
/// X0 (org "Globex", priority 2)
/// └── X1
/// ```
///
/// Users: `U1` in D1, `U2` in D2, `U3` in X1, `ADMIN` (administrator) in X1.
pub async fn seed_org_chart<S: DirectoryWriter + ?Sized>(store: &S) -> Result<(), StoreError> {
    for dept in [
        Department::organization("D0", "Acme", 1),
        Department::child("D1", "D0", "Engineering"),
        Department::child("D2", "D1", "Platform"),
        Department::organization("X0", "Globex", 2),
        Department::child("X1", "X0", "Sales"),
    ] {
        store.put_department(&dept).await?;
    }

    for (user, dept) in [("U1", "D1"), ("U2", "D2"), ("U3", "X1"), ("ADMIN", "X1")] {
        store
            .put_user_department(&PrincipalId::from(user), &PrincipalId::from(dept))
            .await?;
        store
            .put_account(&PrincipalId::from(user), user, user == "ADMIN")
            .await?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixture
// ─────────────────────────────────────────────────────────────────────────────

/// An [`Authz`] instance with recording fakes attached.
pub struct TestFixture<S> {
    pub authz: Authz<S>,
    pub evaluator: Arc<RecordingEvaluator>,
    pub locks: Arc<RecordingLocks>,
    pub crawl: Arc<StaticCrawlStrategies>,
}

impl<S: AuthzStore> TestFixture<S> {
    /// Wire `store` with fresh fakes.
    pub fn with_store(store: S, config: AuthzConfig) -> Self {
        let evaluator = Arc::new(RecordingEvaluator::new());
        let locks = Arc::new(RecordingLocks::new());
        let crawl = Arc::new(StaticCrawlStrategies::new());
        let services = Services::new(evaluator.clone(), locks.clone()).with_crawl(crawl.clone());
        Self {
            authz: Authz::new(store, services, config),
            evaluator,
            locks,
            crawl,
        }
    }
}

impl TestFixture<MemoryStore> {
    /// A fixture over an empty in-memory store.
    pub fn memory(config: AuthzConfig) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }
}

impl TestFixture<SqliteStore> {
    /// A fixture over an in-memory SQLite database.
    pub fn sqlite_memory(config: AuthzConfig) -> Result<Self, StoreError> {
        let store = SqliteStore::open_memory_with_schema(&config.tenant_schema)?;
        Ok(Self::with_store(store, config))
    }

    /// A fixture over a SQLite file at `path`.
    pub fn sqlite_file(path: impl AsRef<Path>, config: AuthzConfig) -> Result<Self, StoreError> {
        let store = SqliteStore::open(path, &config.tenant_schema)?;
        Ok(Self::with_store(store, config))
    }
}
