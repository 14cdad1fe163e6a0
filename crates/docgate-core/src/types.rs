//! Strong type definitions for principals and their integer codes.
//!
//! Identifiers are newtypes to prevent mixing them up with paths or names.
//! Enums carry the integer codes used by persisted rows.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Identifier of a user, department, organization, group or link.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The empty identifier, used as the parent of department scope objects.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// The raw identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrincipalId({})", self.0)
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PrincipalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Kind of principal that owns an object or appears in a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum PrincipalType {
    /// A user account.
    User = 1,
    /// A department or organization.
    Department = 2,
}

impl PrincipalType {
    /// Convert to the persisted code.
    pub fn to_i32(self) -> i32 {
        self as i32
    }

    /// Parse from the persisted code.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::User),
            2 => Some(Self::Department),
            _ => None,
        }
    }
}

impl TryFrom<i32> for PrincipalType {
    type Error = CoreError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_i32(value).ok_or(CoreError::UnknownCode {
            what: "principal type",
            code: value,
        })
    }
}

/// Kind of principal a custom permission applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum AccessorType {
    /// Placeholder carried by "not found" sentinel records.
    Unknown = -1,
    /// A user account.
    User = 1,
    /// A department or organization.
    Department = 2,
    /// A personal contact group.
    ContactGroup = 3,
    /// An anonymous share link. Never part of permission evaluation.
    AnonymousLink = 4,
    /// A user group.
    Group = 5,
}

impl AccessorType {
    /// Convert to the persisted code.
    pub fn to_i32(self) -> i32 {
        self as i32
    }

    /// Parse from the persisted code.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            -1 => Some(Self::Unknown),
            1 => Some(Self::User),
            2 => Some(Self::Department),
            3 => Some(Self::ContactGroup),
            4 => Some(Self::AnonymousLink),
            5 => Some(Self::Group),
            _ => None,
        }
    }
}

impl TryFrom<i32> for AccessorType {
    type Error = CoreError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_i32(value).ok_or(CoreError::UnknownCode {
            what: "accessor type",
            code: value,
        })
    }
}

/// Kind of a custom permission record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum PermKind {
    /// Grants the bits in `perm_value`.
    Allow = 1,
    /// Denies the bits in `perm_value`.
    Deny = 2,
    /// Marker that stops inheritance from ancestors. Stored, but never
    /// returned by evaluation queries.
    BlockInherit = 3,
}

impl PermKind {
    /// Convert to the persisted code.
    pub fn to_i32(self) -> i32 {
        self as i32
    }

    /// Parse from the persisted code.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Allow),
            2 => Some(Self::Deny),
            3 => Some(Self::BlockInherit),
            _ => None,
        }
    }

    /// Whether records of this kind take part in permission evaluation.
    pub fn is_evaluated(self) -> bool {
        matches!(self, Self::Allow | Self::Deny)
    }
}

impl TryFrom<i32> for PermKind {
    type Error = CoreError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_i32(value).ok_or(CoreError::UnknownCode {
            what: "permission kind",
            code: value,
        })
    }
}

/// Why a custom permission exists. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum PermSource {
    /// Granted explicitly by a user.
    Manual = 1,
    /// Created by a default sharing strategy.
    DefaultStrategy = 2,
    /// Carried over when an object was copied.
    InheritedOnCopy = 3,
}

impl PermSource {
    /// Convert to the persisted code.
    pub fn to_i32(self) -> i32 {
        self as i32
    }

    /// Parse from the persisted code.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Manual),
            2 => Some(Self::DefaultStrategy),
            3 => Some(Self::InheritedOnCopy),
            _ => None,
        }
    }
}

impl TryFrom<i32> for PermSource {
    type Error = CoreError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_i32(value).ok_or(CoreError::UnknownCode {
            what: "permission source",
            code: value,
        })
    }
}
