//! Custom permission records and the permission bitmask.
//!
//! A custom permission is an explicit allow/deny overlay attached to a path
//! and an accessor. Records optionally expire; `end_time == -1` means never.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::path::GnsPath;
use crate::types::{AccessorType, PermKind, PermSource, PrincipalId};

/// `end_time` value meaning "never expires".
pub const NEVER_EXPIRES: i64 = -1;

/// Id carried by sentinel records returned for missing lookups.
pub const MISSING_ID: i64 = -1;

/// A set of permission bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermBits(pub u32);

impl PermBits {
    /// No bits.
    pub const NONE: Self = Self(0);
    /// See that the object exists.
    pub const DISPLAY: Self = Self(0x01);
    /// Preview content in the browser.
    pub const PREVIEW: Self = Self(0x02);
    /// Read (download) content.
    pub const READ: Self = Self(0x04);
    /// Create children.
    pub const CREATE: Self = Self(0x08);
    /// Modify content and attributes.
    pub const EDIT: Self = Self(0x10);
    /// Delete the object.
    pub const DELETE: Self = Self(0x20);
    /// Every defined bit.
    pub const ALL: Self = Self(0x3f);

    /// Raw bit value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for PermBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PermBits {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PermBits {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for PermBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(PermBits, &str); 6] = [
            (PermBits::DISPLAY, "DISPLAY"),
            (PermBits::PREVIEW, "PREVIEW"),
            (PermBits::READ, "READ"),
            (PermBits::CREATE, "CREATE"),
            (PermBits::EDIT, "EDIT"),
            (PermBits::DELETE, "DELETE"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "PermBits(NONE)")
        } else {
            write!(f, "PermBits({})", names.join(" | "))
        }
    }
}

/// An explicit allow/deny overlay on a path for one accessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPermRecord {
    /// Store-assigned id. Ignored on insert.
    pub id: i64,
    /// The object the permission is attached to.
    pub path: GnsPath,
    /// Who the permission applies to.
    pub accessor_id: PrincipalId,
    /// What kind of principal `accessor_id` is.
    pub accessor_type: AccessorType,
    /// Allow or deny.
    pub kind: PermKind,
    /// The bits allowed or denied.
    pub perm_value: PermBits,
    /// Why the grant exists.
    pub source: PermSource,
    /// Expiry (Unix ms), or [`NEVER_EXPIRES`].
    pub end_time: i64,
    /// Creation time (Unix ms).
    pub create_time: i64,
    /// Last modification time (Unix ms).
    pub modify_time: i64,
}

impl CustomPermRecord {
    /// A new manual, non-expiring record. Timestamps are left at 0 for the
    /// caller to fill in.
    pub fn new(
        path: impl Into<GnsPath>,
        accessor_id: impl Into<PrincipalId>,
        accessor_type: AccessorType,
        kind: PermKind,
        perm_value: PermBits,
    ) -> Self {
        Self {
            id: MISSING_ID,
            path: path.into(),
            accessor_id: accessor_id.into(),
            accessor_type,
            kind,
            perm_value,
            source: PermSource::Manual,
            end_time: NEVER_EXPIRES,
            create_time: 0,
            modify_time: 0,
        }
    }

    /// Set the expiry.
    pub fn expires_at(mut self, end_time: i64) -> Self {
        self.end_time = end_time;
        self
    }

    /// Set the source tag.
    pub fn with_source(mut self, source: PermSource) -> Self {
        self.source = source;
        self
    }

    /// Set both timestamps.
    pub fn created_at(mut self, now: i64) -> Self {
        self.create_time = now;
        self.modify_time = now;
        self
    }

    /// The sentinel returned when a lookup finds nothing.
    pub fn missing() -> Self {
        Self {
            id: MISSING_ID,
            path: GnsPath::root(),
            accessor_id: PrincipalId::empty(),
            accessor_type: AccessorType::Unknown,
            kind: PermKind::Allow,
            perm_value: PermBits::NONE,
            source: PermSource::Manual,
            end_time: NEVER_EXPIRES,
            create_time: 0,
            modify_time: 0,
        }
    }

    /// Whether this is the [`missing`](Self::missing) sentinel.
    pub fn is_missing(&self) -> bool {
        self.id == MISSING_ID && self.accessor_type == AccessorType::Unknown
    }

    /// Whether the record never expires.
    pub fn is_indefinite(&self) -> bool {
        self.end_time == NEVER_EXPIRES
    }

    /// Whether the record has expired at `now` (Unix ms).
    pub fn is_expired(&self, now: i64) -> bool {
        !self.is_indefinite() && now >= self.end_time
    }

    /// Whether the record takes part in permission evaluation queries.
    pub fn is_evaluable(&self) -> bool {
        self.kind.is_evaluated() && self.accessor_type != AccessorType::AnonymousLink
    }
}
