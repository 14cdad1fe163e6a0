//! Store traits: the abstract interface for authorization data.
//!
//! These traits let the scope engine and the access dispatcher stay
//! storage-agnostic. Implementations include SQLite (primary) and in-memory
//! (for tests and embedding).
//!
//! Ownership and custom permissions are owned and written exclusively through
//! [`OwnerStore`] and [`CustomPermStore`]. Sharing strategies and the
//! department directory are configuration owned elsewhere and only read here.

use async_trait::async_trait;
use docgate_core::{
    AccessorType, CustomPermRecord, DefaultScopeToggle, Department, GnsPath, OwnerRecord,
    PermKind, PrincipalId, StrategyRecord,
};

use crate::error::Result;

/// Rows per statement for bulk inserts and `IN (...)` lookups.
pub const BATCH_CHUNK_SIZE: usize = 200;

/// Ownership persistence.
///
/// Path arguments are never validated: a malformed path has an empty
/// ancestor chain and simply matches nothing.
#[async_trait]
pub trait OwnerStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert an owner record. Duplicates are not rejected at this layer.
    async fn add_owner(&self, record: &OwnerRecord) -> Result<()>;

    /// Insert many owner records, [`BATCH_CHUNK_SIZE`] per transaction.
    ///
    /// A failure leaves earlier chunks committed.
    async fn add_owners(&self, records: &[OwnerRecord]) -> Result<()>;

    /// Update `modify_time` of the `(path, owner_id)` records. Returns the
    /// number of rows touched.
    async fn touch_owner(
        &self,
        path: &GnsPath,
        owner_id: &PrincipalId,
        modify_time: i64,
    ) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `user_id` owns `path` or any of its ancestors.
    ///
    /// Always `false` for the root (depth 0).
    async fn is_owner(&self, path: &GnsPath, user_id: &PrincipalId) -> Result<bool>;

    /// Owner records attached to `path` or any of its ancestors, shallowest
    /// first. With `only_users`, department owners are filtered out.
    async fn get_inherit_owner_infos_by_doc_id(
        &self,
        path: &GnsPath,
        only_users: bool,
    ) -> Result<Vec<OwnerRecord>>;

    /// Owner records attached to exactly `path`.
    async fn get_owner_infos_by_doc_id(&self, path: &GnsPath) -> Result<Vec<OwnerRecord>>;

    /// Every owner record of `user_id`.
    async fn get_owner_infos_by_user_id(&self, user_id: &PrincipalId) -> Result<Vec<OwnerRecord>>;

    /// Paths strictly below `path` (anywhere when `path` is the root) owned
    /// by `user_id`, shortest first.
    async fn get_sub_objs_by_user_id(
        &self,
        path: &GnsPath,
        user_id: &PrincipalId,
    ) -> Result<Vec<GnsPath>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Deletes (idempotent, return rows removed)
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete the owner records of exactly `path`.
    async fn delete_owner_infos_by_doc_id(&self, path: &GnsPath) -> Result<u64> {
        self.delete_owner_by_file_id(path).await
    }

    /// Delete the owner records of exactly `path`.
    async fn delete_owner_by_file_id(&self, path: &GnsPath) -> Result<u64>;

    /// Delete the owner records of `path` and its whole subtree.
    async fn delete_owner_by_dir_id(&self, path: &GnsPath) -> Result<u64>;

    /// Delete every owner record of `user_id`.
    async fn delete_owner_by_user_id(&self, user_id: &PrincipalId) -> Result<u64>;
}

/// Custom permission persistence.
///
/// Evaluation queries return only `Allow`/`Deny` records and never
/// anonymous-link accessors.
#[async_trait]
pub trait CustomPermStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a record and return its store-assigned id. `record.id` is
    /// ignored.
    async fn add_custom_perm(&self, record: &CustomPermRecord) -> Result<i64>;

    /// Insert many records, [`BATCH_CHUNK_SIZE`] per transaction. Returns
    /// the assigned ids in input order.
    async fn add_custom_perms(&self, records: &[CustomPermRecord]) -> Result<Vec<i64>>;

    /// Overwrite every field of the record with id `record.id`. Returns
    /// whether a row was updated.
    async fn update_custom_perm(&self, record: &CustomPermRecord) -> Result<bool>;

    /// Delete one record by id.
    async fn delete_custom_perm(&self, id: i64) -> Result<u64>;

    /// Delete record `id` only while its `end_time` still equals `end_time`.
    ///
    /// A record renewed after it was read is left alone.
    async fn delete_custom_perm_by_end_time(&self, id: i64, end_time: i64) -> Result<u64>;

    /// Delete the records attached to exactly `path`.
    async fn delete_custom_perm_by_file_id(&self, path: &GnsPath) -> Result<u64>;

    /// Delete the records attached to `path` and its whole subtree.
    async fn delete_custom_perm_by_dir_id(&self, path: &GnsPath) -> Result<u64>;

    /// Delete every record naming `accessor_id`.
    async fn delete_custom_perm_by_user_id(&self, accessor_id: &PrincipalId) -> Result<u64>;

    /// Delete the records of `accessor_id` on exactly `path`.
    async fn delete_custom_perm_by_doc_user_id(
        &self,
        path: &GnsPath,
        accessor_id: &PrincipalId,
    ) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Evaluable records attached to any of `paths`, ordered by path then id.
    /// An empty input returns an empty output without touching the store.
    async fn get_custom_perm_by_doc_ids(&self, paths: &[GnsPath])
        -> Result<Vec<CustomPermRecord>>;

    /// A record by id.
    async fn get_custom_perm_by_id(&self, id: i64) -> Result<Option<CustomPermRecord>>;

    /// The record exactly matching `(path, accessor, kind, end_time)`, used
    /// to detect an identical grant before inserting a duplicate.
    async fn get_custom_perm_by_end_time(
        &self,
        path: &GnsPath,
        accessor_id: &PrincipalId,
        accessor_type: AccessorType,
        kind: PermKind,
        end_time: i64,
    ) -> Result<Option<CustomPermRecord>>;

    /// Every record naming `accessor_id`, ordered by path then id.
    async fn get_custom_perms_by_accessor(
        &self,
        accessor_id: &PrincipalId,
    ) -> Result<Vec<CustomPermRecord>>;

    /// Allow/deny records with `end_time != -1 && end_time < threshold`.
    ///
    /// Feeds an external sweep; the store never deletes expired rows itself.
    async fn get_expire_perm_infos(&self, threshold: i64) -> Result<Vec<CustomPermRecord>>;

    /// Every record except anonymous-link accessors, ordered by path then id.
    async fn get_all_custom_perm(&self) -> Result<Vec<CustomPermRecord>>;
}

/// Extension trait giving the `(found, record)` lookup shape, where a miss
/// yields [`CustomPermRecord::missing`] instead of an error.
pub trait CustomPermStoreExt: CustomPermStore {
    /// [`CustomPermStore::get_custom_perm_by_id`] with a sentinel on miss.
    fn lookup_custom_perm_by_id(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<(bool, CustomPermRecord)>> + Send;

    /// [`CustomPermStore::get_custom_perm_by_end_time`] with a sentinel on
    /// miss.
    fn lookup_custom_perm_by_end_time(
        &self,
        path: &GnsPath,
        accessor_id: &PrincipalId,
        accessor_type: AccessorType,
        kind: PermKind,
        end_time: i64,
    ) -> impl std::future::Future<Output = Result<(bool, CustomPermRecord)>> + Send;
}

impl<S: CustomPermStore + ?Sized> CustomPermStoreExt for S {
    async fn lookup_custom_perm_by_id(&self, id: i64) -> Result<(bool, CustomPermRecord)> {
        Ok(found_or_missing(self.get_custom_perm_by_id(id).await?))
    }

    async fn lookup_custom_perm_by_end_time(
        &self,
        path: &GnsPath,
        accessor_id: &PrincipalId,
        accessor_type: AccessorType,
        kind: PermKind,
        end_time: i64,
    ) -> Result<(bool, CustomPermRecord)> {
        let record = self
            .get_custom_perm_by_end_time(path, accessor_id, accessor_type, kind, end_time)
            .await?;
        Ok(found_or_missing(record))
    }
}

fn found_or_missing(record: Option<CustomPermRecord>) -> (bool, CustomPermRecord) {
    match record {
        Some(record) => (true, record),
        None => (false, CustomPermRecord::missing()),
    }
}

/// Read access to sharing-strategy configuration.
#[async_trait]
pub trait StrategyStore: Send + Sync {
    /// Sharer-role rows whose `obj_id` is one of `obj_ids`.
    async fn get_sharer_strategies(&self, obj_ids: &[PrincipalId]) -> Result<Vec<StrategyRecord>>;

    /// Scope-role rows belonging to any of `strategy_ids`.
    async fn get_scope_records(&self, strategy_ids: &[String]) -> Result<Vec<StrategyRecord>>;

    /// Whether a default-scope toggle is enabled. Missing toggles are off.
    async fn get_default_toggle(&self, toggle: DefaultScopeToggle) -> Result<bool>;
}

/// Read access to the organization/department directory.
#[async_trait]
pub trait Directory: Send + Sync {
    /// The departments `user_id` belongs to directly.
    async fn get_user_department_ids(&self, user_id: &PrincipalId) -> Result<Vec<PrincipalId>>;

    /// Distinct parents of `dept_ids`. Roots contribute nothing.
    async fn get_parent_department_ids(&self, dept_ids: &[PrincipalId])
        -> Result<Vec<PrincipalId>>;

    /// Department nodes for `ids`. Unknown ids are skipped.
    async fn get_departments(&self, ids: &[PrincipalId]) -> Result<Vec<Department>>;

    /// Whether `user_id` is a built-in administrator account.
    async fn is_admin(&self, user_id: &PrincipalId) -> Result<bool>;
}

/// Provisioning of strategy and directory configuration.
///
/// The authorization core never calls these; they exist for the services
/// that own the configuration, and for test fixtures.
#[async_trait]
pub trait DirectoryWriter: Send + Sync {
    /// Insert or replace a department node.
    async fn put_department(&self, dept: &Department) -> Result<()>;

    /// Record that `user_id` belongs directly to `dept_id`.
    async fn put_user_department(&self, user_id: &PrincipalId, dept_id: &PrincipalId)
        -> Result<()>;

    /// Insert or replace a user account.
    async fn put_account(&self, id: &PrincipalId, name: &str, is_admin: bool) -> Result<()>;

    /// Append a sharing-strategy row.
    async fn put_strategy_record(&self, record: &StrategyRecord) -> Result<()>;

    /// Enable or disable a default-scope toggle.
    async fn set_default_toggle(&self, toggle: DefaultScopeToggle, enabled: bool) -> Result<()>;
}

/// Everything the authorization core reads or writes.
pub trait AuthzStore: OwnerStore + CustomPermStore + StrategyStore + Directory {}

impl<S: OwnerStore + CustomPermStore + StrategyStore + Directory + ?Sized> AuthzStore for S {}
