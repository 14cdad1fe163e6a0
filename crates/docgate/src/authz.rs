//! The authorization facade.
//!
//! [`Authz`] wires one store into the access dispatcher, the scope engine
//! and the expiry sweeper. It is built once at process start and shared by
//! request handlers.

use std::path::Path;
use std::sync::Arc;

use docgate_scope::ScopeEngine;
use docgate_store::{AuthzStore, SqliteStore};

use crate::access::AccessController;
use crate::config::AuthzConfig;
use crate::error::Result;
use crate::services::Services;
use crate::sweep::ExpirySweeper;

/// The authorization core.
///
/// Provides:
/// - Access checks and post-operation cleanup
/// - Sharing-scope resolution
/// - Expired-permission sweeps
/// - Direct store access for ownership and permission CRUD
pub struct Authz<S> {
    /// The storage backend.
    store: Arc<S>,
    /// Configuration.
    config: AuthzConfig,
    access: AccessController<S>,
    scope: ScopeEngine<S>,
    sweeper: ExpirySweeper<S>,
}

impl<S: AuthzStore> Authz<S> {
    /// Create the core over `store`.
    pub fn new(store: S, services: Services, config: AuthzConfig) -> Self {
        let store = Arc::new(store);
        Self {
            access: AccessController::new(Arc::clone(&store), services, config.clone()),
            scope: ScopeEngine::new(Arc::clone(&store), config.scope()),
            sweeper: ExpirySweeper::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    /// The access dispatcher.
    pub fn access(&self) -> &AccessController<S> {
        &self.access
    }

    /// The scope engine.
    pub fn scope(&self) -> &ScopeEngine<S> {
        &self.scope
    }

    /// The expiry sweeper.
    pub fn sweeper(&self) -> &ExpirySweeper<S> {
        &self.sweeper
    }
}

impl Authz<SqliteStore> {
    /// Configure the core over the SQLite file at `path`, under the tenant
    /// prefix from `config`. The database is opened on first use.
    pub fn sqlite(path: impl AsRef<Path>, services: Services, config: AuthzConfig) -> Self {
        let store = SqliteStore::lazy(path, &config.tenant_schema);
        Self::new(store, services, config)
    }

    /// As [`Authz::sqlite`], but open and migrate the database immediately.
    pub fn open_sqlite(
        path: impl AsRef<Path>,
        services: Services,
        config: AuthzConfig,
    ) -> Result<Self> {
        let store = SqliteStore::open(path, &config.tenant_schema)?;
        Ok(Self::new(store, services, config))
    }
}
