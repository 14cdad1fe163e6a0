//! Configuration for the authorization core.

use serde::{Deserialize, Serialize};

use docgate_core::PrincipalId;
use docgate_scope::ScopeConfig;
use docgate_store::TenantSchema;

use crate::error::{AuthzError, Result};

/// The built-in data-exchange system account.
pub const DEFAULT_DATA_EXCHANGE_PRINCIPAL: &str = "266c6a42-6131-4d62-8f39-853e7093701c";

/// Configuration for [`Authz`](crate::Authz).
///
/// Resolved once at process start. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// System principal that bypasses every access check.
    pub data_exchange_principal: PrincipalId,
    /// Restrict sharing to each user's computed scope.
    pub share_limit_enabled: bool,
    /// Merge default-scope toggles into non-empty scopes too.
    pub superimpose_default_scope: bool,
    /// Allow crawl strategies to exempt realname users from the
    /// list-file-version check.
    pub file_crawl_enabled: bool,
    /// Table prefix of this deployment.
    pub tenant_schema: TenantSchema,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            data_exchange_principal: PrincipalId::new(DEFAULT_DATA_EXCHANGE_PRINCIPAL),
            share_limit_enabled: true,
            superimpose_default_scope: false,
            file_crawl_enabled: false,
            tenant_schema: TenantSchema::default(),
        }
    }
}

impl AuthzConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| AuthzError::Config(e.to_string()))?;
        if config.data_exchange_principal.is_empty() {
            return Err(AuthzError::Config(
                "data_exchange_principal must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    /// The scope-engine subset.
    pub fn scope(&self) -> ScopeConfig {
        ScopeConfig {
            share_limit_enabled: self.share_limit_enabled,
            superimpose_default_scope: self.superimpose_default_scope,
        }
    }
}
