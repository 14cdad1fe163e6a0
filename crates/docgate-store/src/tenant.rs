//! Tenant-qualified table naming.
//!
//! Each deployment keeps its rows under a tenant prefix resolved once at
//! process start, so several tenants can share one database file. Table
//! names cannot be bound as statement parameters, which is why the prefix is
//! validated up front and only ever interpolated in its validated form.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, StoreError};

/// Maximum prefix length.
pub const MAX_SCHEMA_LEN: usize = 48;

/// A validated tenant prefix: `[A-Za-z0-9_]{1,48}`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantSchema(String);

impl TenantSchema {
    /// Validate a tenant prefix.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.len() <= MAX_SCHEMA_LEN
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(Self(name))
        } else {
            Err(StoreError::InvalidSchema(name))
        }
    }

    /// The prefix text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Table names under this prefix.
    pub fn tables(&self) -> TableNames {
        TableNames::for_schema(self)
    }
}

impl Default for TenantSchema {
    fn default() -> Self {
        Self("docgate".to_string())
    }
}

impl fmt::Debug for TenantSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantSchema({})", self.0)
    }
}

impl fmt::Display for TenantSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantSchema {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TenantSchema> for String {
    fn from(schema: TenantSchema) -> Self {
        schema.0
    }
}

/// Fully qualified table names for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub migrations: String,
    pub owner: String,
    pub custom_perm: String,
    pub strategy: String,
    pub toggle: String,
    pub department: String,
    pub user_department: String,
    pub account: String,
}

impl TableNames {
    fn for_schema(schema: &TenantSchema) -> Self {
        let t = |name: &str| format!("{}_{}", schema.as_str(), name);
        Self {
            migrations: t("schema_migrations"),
            owner: t("owner"),
            custom_perm: t("custom_perm"),
            strategy: t("sharing_strategy"),
            toggle: t("strategy_toggle"),
            department: t("department"),
            user_department: t("user_department"),
            account: t("account"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_validation() {
        assert!(TenantSchema::new("tenant_01").is_ok());
        assert!(TenantSchema::new("").is_err());
        assert!(TenantSchema::new("bad-name").is_err());
        assert!(TenantSchema::new("x; DROP TABLE y").is_err());
        assert!(TenantSchema::new("a".repeat(MAX_SCHEMA_LEN + 1)).is_err());
    }

    #[test]
    fn test_table_names() {
        let tables = TenantSchema::new("acme").unwrap().tables();
        assert_eq!(tables.owner, "acme_owner");
        assert_eq!(tables.custom_perm, "acme_custom_perm");
        assert_eq!(tables.migrations, "acme_schema_migrations");
    }
}
