//! Scope resolution settings.

use serde::{Deserialize, Serialize};

/// Feature flags consulted during scope resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// When off, sharing is not restricted: every user is in scope.
    pub share_limit_enabled: bool,

    /// Merge the default-scope toggles into every scope, not only empty ones.
    pub superimpose_default_scope: bool,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            share_limit_enabled: true,
            superimpose_default_scope: false,
        }
    }
}
