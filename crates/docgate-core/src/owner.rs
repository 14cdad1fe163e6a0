//! Ownership records.
//!
//! A path may have any number of owners. Ownership at an ancestor is
//! inherited by every descendant; stores return the union of matches and
//! leave picking "the" owner to callers.

use serde::{Deserialize, Serialize};

use crate::path::GnsPath;
use crate::types::{PrincipalId, PrincipalType};

/// Who owns which path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    /// The owned object.
    pub path: GnsPath,
    /// The owning principal.
    pub owner_id: PrincipalId,
    /// User or department.
    pub owner_type: PrincipalType,
    /// Display name captured when ownership was assigned.
    pub owner_name: String,
    /// Last modification time (Unix ms).
    pub modify_time: i64,
    /// Whether the owner may be removed by other owners.
    pub deletable: bool,
}

impl OwnerRecord {
    /// A deletable user owner.
    pub fn user(
        path: impl Into<GnsPath>,
        owner_id: impl Into<PrincipalId>,
        owner_name: impl Into<String>,
        modify_time: i64,
    ) -> Self {
        Self {
            path: path.into(),
            owner_id: owner_id.into(),
            owner_type: PrincipalType::User,
            owner_name: owner_name.into(),
            modify_time,
            deletable: true,
        }
    }

    /// A deletable department owner.
    pub fn department(
        path: impl Into<GnsPath>,
        owner_id: impl Into<PrincipalId>,
        owner_name: impl Into<String>,
        modify_time: i64,
    ) -> Self {
        Self {
            owner_type: PrincipalType::Department,
            ..Self::user(path, owner_id, owner_name, modify_time)
        }
    }

    /// Mark the owner as not deletable.
    pub fn pinned(mut self) -> Self {
        self.deletable = false;
        self
    }
}

/// The owners attached at the deepest ancestor that has any.
///
/// This is the usual UI policy for showing "the" owner of an object.
pub fn most_specific_owners(records: &[OwnerRecord]) -> Vec<&OwnerRecord> {
    let Some(max_depth) = records.iter().map(|r| r.path.depth()).max() else {
        return Vec::new();
    };
    records
        .iter()
        .filter(|r| r.path.depth() == max_depth)
        .collect()
}
