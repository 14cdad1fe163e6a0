//! Property tests over both store backends.

use proptest::prelude::*;

use docgate::core::{CustomPermRecord, GnsPath, OwnerRecord, PrincipalId};
use docgate::store::{CustomPermStore, MemoryStore, OwnerStore, SqliteStore};
use docgate_testkit::generators::{custom_perm_record, dense_path, owner_record, principal_id};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Runtime::new()
        .expect("runtime")
        .block_on(future)
}

/// A fresh store of each backend.
fn backends() -> (MemoryStore, SqliteStore) {
    (
        MemoryStore::new(),
        SqliteStore::open_memory().expect("sqlite"),
    )
}

async fn seed_owners<S: OwnerStore>(store: &S, owners: &[OwnerRecord]) {
    store.add_owners(owners).await.expect("seed owners");
}

async fn owners_of_all<S: OwnerStore>(store: &S) -> Vec<OwnerRecord> {
    let mut out = Vec::new();
    for i in 0..6 {
        out.extend(
            store
                .get_owner_infos_by_user_id(&PrincipalId::new(format!("u{}", i)))
                .await
                .expect("owners"),
        );
    }
    out
}

async fn is_owner_on<S: OwnerStore>(store: S, owners: &[OwnerRecord], path: &GnsPath, user: &PrincipalId) -> bool {
    seed_owners(&store, owners).await;
    store.is_owner(path, user).await.expect("is_owner")
}

async fn dir_delete_on<S: OwnerStore>(
    store: S,
    owners: &[OwnerRecord],
    dir: &GnsPath,
) -> (u64, u64, Vec<OwnerRecord>) {
    seed_owners(&store, owners).await;
    let first = store.delete_owner_by_dir_id(dir).await.expect("delete");
    let second = store.delete_owner_by_dir_id(dir).await.expect("delete");
    (first, second, owners_of_all(&store).await)
}

async fn sub_objs_on<S: OwnerStore>(
    store: S,
    owners: &[OwnerRecord],
    dir: &GnsPath,
    user: &PrincipalId,
) -> (Vec<GnsPath>, Vec<OwnerRecord>) {
    seed_owners(&store, owners).await;
    let subs = store.get_sub_objs_by_user_id(dir, user).await.expect("sub objs");
    let inherited = store
        .get_inherit_owner_infos_by_doc_id(dir, false)
        .await
        .expect("inherited");
    (subs, inherited)
}

async fn expired_on<S: CustomPermStore>(
    store: S,
    records: &[CustomPermRecord],
    low: i64,
    high: i64,
) -> (Vec<CustomPermRecord>, Vec<CustomPermRecord>, Vec<CustomPermRecord>) {
    store.add_custom_perms(records).await.expect("seed perms");
    let early = store.get_expire_perm_infos(low).await.expect("early");
    let late = store.get_expire_perm_infos(high).await.expect("late");
    let mut all = Vec::new();
    for record in records {
        all.extend(
            store
                .get_custom_perms_by_accessor(&record.accessor_id)
                .await
                .expect("by accessor"),
        );
    }
    all.sort_by_key(|r| r.id);
    all.dedup_by_key(|r| r.id);
    (early, late, all)
}

fn owner_key(o: &OwnerRecord) -> (String, String) {
    (o.path.as_str().to_string(), o.owner_id.as_str().to_string())
}

fn sorted_keys(owners: &[OwnerRecord]) -> Vec<(String, String)> {
    let mut keys: Vec<_> = owners.iter().map(owner_key).collect();
    keys.sort();
    keys
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_is_owner_matches_ancestor_records(
        owners in prop::collection::vec(owner_record(), 0..12),
        path in dense_path(5),
        user in principal_id(),
    ) {
        let expected = owners
            .iter()
            .any(|o| o.owner_id == user && path.ancestors().contains(&o.path.normalized()));

        let (memory, sqlite) = backends();
        let (in_memory, in_sqlite) = block_on(async {
            (
                is_owner_on(memory, &owners, &path, &user).await,
                is_owner_on(sqlite, &owners, &path, &user).await,
            )
        });
        prop_assert_eq!(in_memory, expected);
        prop_assert_eq!(in_sqlite, expected);
    }

    #[test]
    fn test_dir_delete_is_idempotent(
        owners in prop::collection::vec(owner_record(), 0..12),
        dir in dense_path(3),
    ) {
        let doomed = owners
            .iter()
            .filter(|o| o.path == dir || o.path.is_descendant_of(&dir))
            .count() as u64;

        let (memory, sqlite) = backends();
        let results = block_on(async {
            vec![
                dir_delete_on(memory, &owners, &dir).await,
                dir_delete_on(sqlite, &owners, &dir).await,
            ]
        });

        for (first, second, survivors) in &results {
            prop_assert_eq!(*first, doomed);
            prop_assert_eq!(*second, 0);
            prop_assert_eq!(survivors.len() as u64, owners.len() as u64 - doomed);
            for owner in survivors {
                prop_assert!(owner.path != dir && !owner.path.is_descendant_of(&dir));
            }
        }
        prop_assert_eq!(sorted_keys(&results[0].2), sorted_keys(&results[1].2));
    }

    #[test]
    fn test_sub_objs_are_owned_descendants_shortest_first(
        owners in prop::collection::vec(owner_record(), 0..12),
        dir in dense_path(2),
        user in principal_id(),
    ) {
        let (memory, sqlite) = backends();
        let ((mem_subs, mem_inherited), (sql_subs, sql_inherited)) = block_on(async {
            (
                sub_objs_on(memory, &owners, &dir, &user).await,
                sub_objs_on(sqlite, &owners, &dir, &user).await,
            )
        });

        for path in &mem_subs {
            prop_assert!(path.is_descendant_of(&dir));
            prop_assert!(owners.iter().any(|o| o.owner_id == user && &o.path == path));
        }
        for pair in mem_subs.windows(2) {
            prop_assert!(pair[0].as_str().len() <= pair[1].as_str().len());
        }
        prop_assert_eq!(&mem_subs, &sql_subs);
        prop_assert_eq!(sorted_keys(&mem_inherited), sorted_keys(&sql_inherited));
    }

    #[test]
    fn test_expired_set_is_exact_and_grows_with_threshold(
        records in prop::collection::vec(custom_perm_record(), 0..16),
        low in 0i64..=10_000,
        step in 0i64..=10_000,
    ) {
        let high = low + step;
        let (memory, sqlite) = backends();
        let results = block_on(async {
            vec![
                expired_on(memory, &records, low, high).await,
                expired_on(sqlite, &records, low, high).await,
            ]
        });

        for (early, late, all) in &results {
            let late_ids: Vec<i64> = late.iter().map(|r| r.id).collect();
            for record in early {
                prop_assert!(late_ids.contains(&record.id));
            }
            for record in late {
                prop_assert!(record.end_time != -1 && record.end_time < high);
                prop_assert!(record.kind.is_evaluated());
            }

            // Every stored allow/deny record past its expiry is reported.
            let expected: Vec<i64> = all
                .iter()
                .filter(|r| r.kind.is_evaluated() && r.end_time != -1 && r.end_time < high)
                .map(|r| r.id)
                .collect();
            let mut reported = late_ids.clone();
            reported.sort();
            prop_assert_eq!(reported, expected);
        }
    }
}
