//! Sharing scope: strategy records, org-chart nodes and computed scope maps.
//!
//! A user's scope is the set of principals the user may share with or
//! administer. It is computed from sharing-strategy configuration and the
//! department hierarchy, and represented as a [`ScopeMap`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{PrincipalId, PrincipalType};

/// Role of a principal in a sharing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum StrategyRole {
    /// The principal may share; the strategy's scope rows say with whom.
    Sharer = 1,
    /// The principal is part of the strategy's scope.
    Scope = 2,
}

impl StrategyRole {
    /// Convert to the persisted code.
    pub fn to_i32(self) -> i32 {
        self as i32
    }

    /// Parse from the persisted code.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Sharer),
            2 => Some(Self::Scope),
            _ => None,
        }
    }
}

/// One row of sharing-strategy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyRecord {
    /// Strategy the row belongs to.
    pub strategy_id: String,
    /// The principal the row names.
    pub obj_id: PrincipalId,
    /// Kind of `obj_id`.
    pub obj_type: PrincipalType,
    /// For scope rows naming a user: the department the user was picked
    /// under. Empty otherwise.
    pub parent_id: PrincipalId,
    /// Sharer or scope.
    pub role: StrategyRole,
}

/// Global default-scope toggles of the sharing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefaultScopeToggle {
    /// `"-1"`: every user's direct departments are in scope.
    DirectDepartment,
    /// `"-2"`: every user's direct organizations are in scope.
    DirectOrganization,
}

impl DefaultScopeToggle {
    /// The persisted toggle key.
    pub fn key(self) -> &'static str {
        match self {
            Self::DirectDepartment => "-1",
            Self::DirectOrganization => "-2",
        }
    }

    /// Parse a persisted toggle key.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "-1" => Some(Self::DirectDepartment),
            "-2" => Some(Self::DirectOrganization),
            _ => None,
        }
    }
}

/// A node of the department hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    /// Department id.
    pub id: PrincipalId,
    /// Parent department, `None` for roots.
    pub parent_id: Option<PrincipalId>,
    /// Display name.
    pub name: String,
    /// Whether this root is an organization.
    pub is_enterprise: bool,
    /// Sort priority among organizations (lower first).
    pub priority: i32,
}

impl Department {
    /// A root organization.
    pub fn organization(id: impl Into<PrincipalId>, name: impl Into<String>, priority: i32) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            name: name.into(),
            is_enterprise: true,
            priority,
        }
    }

    /// A department under `parent_id`.
    pub fn child(
        id: impl Into<PrincipalId>,
        parent_id: impl Into<PrincipalId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: Some(parent_id.into()),
            name: name.into(),
            is_enterprise: false,
            priority: 0,
        }
    }
}

/// A root organization as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgInfo {
    /// Organization id.
    pub id: PrincipalId,
    /// Display name.
    pub name: String,
    /// Sort priority (lower first).
    pub priority: i32,
}

/// One member of a computed scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeObject {
    /// The principal.
    pub id: PrincipalId,
    /// For users: the department the user is in scope under. Empty for
    /// departments.
    pub parent_id: PrincipalId,
    /// User or department.
    pub kind: PrincipalType,
}

/// Key of a [`ScopeMap`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKey {
    /// Direct membership test by id.
    Id(PrincipalId),
    /// A user under a specific department.
    Member {
        /// The user.
        id: PrincipalId,
        /// The department.
        parent_id: PrincipalId,
    },
}

/// A computed scope, keyed by id and by `(id, parent)` for users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeMap {
    entries: HashMap<ScopeKey, ScopeObject>,
}

impl ScopeMap {
    /// An empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user in scope under `parent_id`, under both key shapes.
    pub fn insert_user(&mut self, id: PrincipalId, parent_id: PrincipalId) {
        let object = ScopeObject {
            id: id.clone(),
            parent_id: parent_id.clone(),
            kind: PrincipalType::User,
        };
        self.entries.insert(
            ScopeKey::Member {
                id: id.clone(),
                parent_id,
            },
            object.clone(),
        );
        self.entries.insert(ScopeKey::Id(id), object);
    }

    /// Add a department, under the id key only.
    pub fn insert_department(&mut self, id: PrincipalId) {
        let object = ScopeObject {
            id: id.clone(),
            parent_id: PrincipalId::empty(),
            kind: PrincipalType::Department,
        };
        self.entries.insert(ScopeKey::Id(id), object);
    }

    /// Merge every entry of `other` into `self`.
    pub fn extend(&mut self, other: ScopeMap) {
        self.entries.extend(other.entries);
    }

    /// Whether `id` is in scope by id.
    pub fn contains_id(&self, id: &PrincipalId) -> bool {
        self.entries.contains_key(&ScopeKey::Id(id.clone()))
    }

    /// Whether `id` is in scope, trying the `(id, parent)` key first and the
    /// id key second.
    pub fn contains(&self, id: &PrincipalId, parent_id: Option<&PrincipalId>) -> bool {
        if let Some(parent_id) = parent_id {
            let member = ScopeKey::Member {
                id: id.clone(),
                parent_id: parent_id.clone(),
            };
            if self.entries.contains_key(&member) {
                return true;
            }
        }
        self.contains_id(id)
    }

    /// Look up an entry by key.
    pub fn get(&self, key: &ScopeKey) -> Option<&ScopeObject> {
        self.entries.get(key)
    }

    /// Number of keys (users count once per key shape).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the scope is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over raw entries.
    pub fn iter(&self) -> impl Iterator<Item = (&ScopeKey, &ScopeObject)> {
        self.entries.iter()
    }

    /// Distinct scope objects: departments once, users once per parent.
    pub fn objects(&self) -> Vec<&ScopeObject> {
        self.entries
            .iter()
            .filter(|(key, object)| match key {
                ScopeKey::Id(_) => object.kind == PrincipalType::Department,
                ScopeKey::Member { .. } => true,
            })
            .map(|(_, object)| object)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_inserted_under_both_keys() {
        let mut scope = ScopeMap::new();
        scope.insert_user("u1".into(), "d1".into());

        assert_eq!(scope.len(), 2);
        assert!(scope.contains_id(&"u1".into()));
        assert!(scope.contains(&"u1".into(), Some(&"d1".into())));
        // Falls back to the id key when the parent does not match.
        assert!(scope.contains(&"u1".into(), Some(&"d9".into())));
    }

    #[test]
    fn test_department_inserted_under_id_only() {
        let mut scope = ScopeMap::new();
        scope.insert_department("d1".into());
        assert_eq!(scope.len(), 1);
        assert_eq!(
            scope.get(&ScopeKey::Id("d1".into())).map(|o| o.kind),
            Some(PrincipalType::Department)
        );
    }

    #[test]
    fn test_objects_are_distinct() {
        let mut scope = ScopeMap::new();
        scope.insert_user("u1".into(), "d1".into());
        scope.insert_user("u1".into(), "d2".into());
        scope.insert_department("d1".into());
        assert_eq!(scope.objects().len(), 3);
    }

    #[test]
    fn test_toggle_keys() {
        assert_eq!(DefaultScopeToggle::DirectDepartment.key(), "-1");
        assert_eq!(
            DefaultScopeToggle::from_key("-2"),
            Some(DefaultScopeToggle::DirectOrganization)
        );
        assert_eq!(DefaultScopeToggle::from_key("x"), None);
    }
}
