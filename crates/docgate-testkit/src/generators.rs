//! Proptest generators for property-based testing.

use proptest::prelude::*;

use docgate_core::{
    AccessorType, CustomPermRecord, GnsPath, OwnerRecord, PermBits, PermKind, PermSource,
    PrincipalId, NEVER_EXPIRES,
};

/// Generate a path segment.
pub fn segment() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.]{1,8}".prop_map(String::from)
}

/// Generate a well-formed path of depth `0..=max_depth` in one of the
/// accepted leading forms.
pub fn gns_path(max_depth: usize) -> impl Strategy<Value = GnsPath> {
    (
        prop_oneof![Just("gns://"), Just("/"), Just("")],
        prop::collection::vec(segment(), 0..=max_depth),
    )
        .prop_map(|(lead, segments)| GnsPath::new(format!("{}{}", lead, segments.join("/"))))
}

/// Generate a slash-prefixed path drawn from a small alphabet, so that
/// generated paths frequently share ancestors.
pub fn dense_path(max_depth: usize) -> impl Strategy<Value = GnsPath> {
    prop::collection::vec(prop_oneof![Just("A"), Just("B"), Just("AB")], 1..=max_depth)
        .prop_map(|segments| GnsPath::new(format!("/{}", segments.join("/"))))
}

/// Generate a principal id from a small pool.
pub fn principal_id() -> impl Strategy<Value = PrincipalId> {
    (0u8..6).prop_map(|i| PrincipalId::new(format!("u{}", i)))
}

/// Generate a permission bitmask.
pub fn perm_bits() -> impl Strategy<Value = PermBits> {
    (0u32..=PermBits::ALL.bits()).prop_map(PermBits)
}

/// Generate a stored permission kind.
pub fn perm_kind() -> impl Strategy<Value = PermKind> {
    prop_oneof![
        Just(PermKind::Allow),
        Just(PermKind::Deny),
        Just(PermKind::BlockInherit),
    ]
}

/// Generate an accessor type.
pub fn accessor_type() -> impl Strategy<Value = AccessorType> {
    prop_oneof![
        Just(AccessorType::User),
        Just(AccessorType::Department),
        Just(AccessorType::ContactGroup),
        Just(AccessorType::AnonymousLink),
        Just(AccessorType::Group),
    ]
}

/// Generate an expiry: either never, or a timestamp.
pub fn end_time() -> impl Strategy<Value = i64> {
    prop_oneof![Just(NEVER_EXPIRES), 0i64..=10_000i64]
}

/// Generate an owner record on a dense path.
pub fn owner_record() -> impl Strategy<Value = OwnerRecord> {
    (dense_path(4), principal_id(), any::<bool>()).prop_map(|(path, owner, department)| {
        let name = owner.as_str().to_uppercase();
        if department {
            OwnerRecord::department(path, owner, name, 0)
        } else {
            OwnerRecord::user(path, owner, name, 0)
        }
    })
}

/// Generate a custom permission record on a dense path.
pub fn custom_perm_record() -> impl Strategy<Value = CustomPermRecord> {
    (
        dense_path(4),
        principal_id(),
        accessor_type(),
        perm_kind(),
        perm_bits(),
        end_time(),
        prop_oneof![
            Just(PermSource::Manual),
            Just(PermSource::DefaultStrategy),
            Just(PermSource::InheritedOnCopy),
        ],
    )
        .prop_map(|(path, accessor, accessor_type, kind, bits, end, source)| {
            CustomPermRecord::new(path, accessor, accessor_type, kind, bits)
                .expires_at(end)
                .with_source(source)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_ancestors_end_with_path(path in gns_path(6)) {
            let ancestors = path.ancestors();
            prop_assert_eq!(ancestors.len(), path.depth());
            if let Some(last) = ancestors.last() {
                prop_assert_eq!(last, &path.normalized());
            }
        }

        #[test]
        fn test_prefixes_are_ancestors(path in gns_path(6)) {
            for d in 1..=path.depth() {
                let prefix = path.prefix_at_depth(d).unwrap();
                prop_assert_eq!(prefix.depth(), d);
                if d < path.depth() {
                    prop_assert!(path.is_descendant_of(&prefix));
                }
            }
            prop_assert!(path.prefix_at_depth(path.depth() + 1).is_none());
        }

        #[test]
        fn test_generated_records_expire_consistently(record in custom_perm_record(), now in 0i64..=20_000) {
            if record.end_time == NEVER_EXPIRES {
                prop_assert!(!record.is_expired(now));
            } else {
                prop_assert_eq!(record.is_expired(now), now >= record.end_time);
            }
        }
    }
}
