//! In-memory implementation of the store traits.
//!
//! This is primarily for testing and embedding. It has the same semantics as
//! SQLite, including result ordering, but keeps everything in memory with no
//! persistence.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use docgate_core::{
    AccessorType, CustomPermRecord, DefaultScopeToggle, Department, GnsPath, OwnerRecord,
    PermKind, PrincipalId, PrincipalType, StrategyRecord, StrategyRole,
};

use crate::error::{Result, StoreError};
use crate::traits::{CustomPermStore, Directory, DirectoryWriter, OwnerStore, StrategyStore};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Owner records in insertion order.
    owners: Vec<OwnerRecord>,

    /// Custom permissions indexed by id.
    perms: BTreeMap<i64, CustomPermRecord>,

    /// Last assigned custom permission id.
    last_perm_id: i64,

    /// Strategy rows in insertion order.
    strategies: Vec<StrategyRecord>,

    /// Default-scope toggles.
    toggles: HashMap<DefaultScopeToggle, bool>,

    /// Department nodes by id.
    departments: BTreeMap<PrincipalId, Department>,

    /// Direct department memberships by user.
    memberships: BTreeMap<PrincipalId, BTreeSet<PrincipalId>>,

    /// Accounts: id -> (name, is_admin).
    accounts: HashMap<PrincipalId, (String, bool)>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn insert_perm(&mut self, record: &CustomPermRecord) -> i64 {
        self.last_perm_id += 1;
        let id = self.last_perm_id;
        let mut record = record.clone();
        record.id = id;
        self.perms.insert(id, record);
        id
    }
}

/// Whether `candidate` is `path` or lies below it, by text.
fn in_subtree(candidate: &GnsPath, exact: &str, prefix: &str) -> bool {
    candidate.as_str() == exact || candidate.as_str().starts_with(prefix)
}

/// Character length, matching SQLite's `length()` on text.
fn text_len(path: &GnsPath) -> usize {
    path.as_str().chars().count()
}

fn sort_by_path_then_id(records: &mut [CustomPermRecord]) {
    records.sort_by(|a, b| a.path.cmp(&b.path).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl OwnerStore for MemoryStore {
    async fn add_owner(&self, record: &OwnerRecord) -> Result<()> {
        self.write()?.owners.push(record.clone());
        Ok(())
    }

    async fn add_owners(&self, records: &[OwnerRecord]) -> Result<()> {
        self.write()?.owners.extend_from_slice(records);
        Ok(())
    }

    async fn touch_owner(
        &self,
        path: &GnsPath,
        owner_id: &PrincipalId,
        modify_time: i64,
    ) -> Result<u64> {
        let mut inner = self.write()?;
        let mut touched = 0;
        for record in inner
            .owners
            .iter_mut()
            .filter(|r| r.path == *path && r.owner_id == *owner_id)
        {
            record.modify_time = modify_time;
            touched += 1;
        }
        Ok(touched)
    }

    async fn is_owner(&self, path: &GnsPath, user_id: &PrincipalId) -> Result<bool> {
        let ancestors = path.ancestors();
        if ancestors.is_empty() {
            return Ok(false);
        }
        let inner = self.read()?;
        Ok(inner
            .owners
            .iter()
            .any(|r| r.owner_id == *user_id && ancestors.contains(&r.path)))
    }

    async fn get_inherit_owner_infos_by_doc_id(
        &self,
        path: &GnsPath,
        only_users: bool,
    ) -> Result<Vec<OwnerRecord>> {
        let ancestors = path.ancestors();
        if ancestors.is_empty() {
            return Ok(Vec::new());
        }
        let inner = self.read()?;
        let mut records: Vec<OwnerRecord> = inner
            .owners
            .iter()
            .filter(|r| ancestors.contains(&r.path))
            .filter(|r| !only_users || r.owner_type == PrincipalType::User)
            .cloned()
            .collect();
        // Stable sort keeps insertion order within a path.
        records.sort_by(|a, b| {
            text_len(&a.path)
                .cmp(&text_len(&b.path))
                .then_with(|| a.path.cmp(&b.path))
        });
        Ok(records)
    }

    async fn get_owner_infos_by_doc_id(&self, path: &GnsPath) -> Result<Vec<OwnerRecord>> {
        let inner = self.read()?;
        Ok(inner
            .owners
            .iter()
            .filter(|r| r.path == *path)
            .cloned()
            .collect())
    }

    async fn get_owner_infos_by_user_id(&self, user_id: &PrincipalId) -> Result<Vec<OwnerRecord>> {
        let inner = self.read()?;
        let mut records: Vec<OwnerRecord> = inner
            .owners
            .iter()
            .filter(|r| r.owner_id == *user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            text_len(&a.path)
                .cmp(&text_len(&b.path))
                .then_with(|| a.path.cmp(&b.path))
        });
        Ok(records)
    }

    async fn get_sub_objs_by_user_id(
        &self,
        path: &GnsPath,
        user_id: &PrincipalId,
    ) -> Result<Vec<GnsPath>> {
        let prefix = (!path.is_root()).then(|| path.subtree_prefix());
        let inner = self.read()?;
        let paths: BTreeSet<(usize, GnsPath)> = inner
            .owners
            .iter()
            .filter(|r| r.owner_id == *user_id)
            .filter(|r| match &prefix {
                Some(prefix) => r.path.as_str().starts_with(prefix.as_str()),
                None => true,
            })
            .map(|r| (text_len(&r.path), r.path.clone()))
            .collect();
        Ok(paths.into_iter().map(|(_, p)| p).collect())
    }

    async fn delete_owner_by_file_id(&self, path: &GnsPath) -> Result<u64> {
        let mut inner = self.write()?;
        let before = inner.owners.len();
        inner.owners.retain(|r| r.path != *path);
        Ok((before - inner.owners.len()) as u64)
    }

    async fn delete_owner_by_dir_id(&self, path: &GnsPath) -> Result<u64> {
        let prefix = path.subtree_prefix();
        let mut inner = self.write()?;
        let before = inner.owners.len();
        inner
            .owners
            .retain(|r| !in_subtree(&r.path, path.as_str(), &prefix));
        Ok((before - inner.owners.len()) as u64)
    }

    async fn delete_owner_by_user_id(&self, user_id: &PrincipalId) -> Result<u64> {
        let mut inner = self.write()?;
        let before = inner.owners.len();
        inner.owners.retain(|r| r.owner_id != *user_id);
        Ok((before - inner.owners.len()) as u64)
    }
}

#[async_trait]
impl CustomPermStore for MemoryStore {
    async fn add_custom_perm(&self, record: &CustomPermRecord) -> Result<i64> {
        Ok(self.write()?.insert_perm(record))
    }

    async fn add_custom_perms(&self, records: &[CustomPermRecord]) -> Result<Vec<i64>> {
        let mut inner = self.write()?;
        Ok(records.iter().map(|r| inner.insert_perm(r)).collect())
    }

    async fn update_custom_perm(&self, record: &CustomPermRecord) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.perms.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_custom_perm(&self, id: i64) -> Result<u64> {
        Ok(self.write()?.perms.remove(&id).map_or(0, |_| 1))
    }

    async fn delete_custom_perm_by_end_time(&self, id: i64, end_time: i64) -> Result<u64> {
        let mut inner = self.write()?;
        if inner.perms.get(&id).map(|r| r.end_time) != Some(end_time) {
            return Ok(0);
        }
        Ok(inner.perms.remove(&id).map_or(0, |_| 1))
    }

    async fn delete_custom_perm_by_file_id(&self, path: &GnsPath) -> Result<u64> {
        let mut inner = self.write()?;
        let before = inner.perms.len();
        inner.perms.retain(|_, r| r.path != *path);
        Ok((before - inner.perms.len()) as u64)
    }

    async fn delete_custom_perm_by_dir_id(&self, path: &GnsPath) -> Result<u64> {
        let prefix = path.subtree_prefix();
        let mut inner = self.write()?;
        let before = inner.perms.len();
        inner
            .perms
            .retain(|_, r| !in_subtree(&r.path, path.as_str(), &prefix));
        Ok((before - inner.perms.len()) as u64)
    }

    async fn delete_custom_perm_by_user_id(&self, accessor_id: &PrincipalId) -> Result<u64> {
        let mut inner = self.write()?;
        let before = inner.perms.len();
        inner.perms.retain(|_, r| r.accessor_id != *accessor_id);
        Ok((before - inner.perms.len()) as u64)
    }

    async fn delete_custom_perm_by_doc_user_id(
        &self,
        path: &GnsPath,
        accessor_id: &PrincipalId,
    ) -> Result<u64> {
        let mut inner = self.write()?;
        let before = inner.perms.len();
        inner
            .perms
            .retain(|_, r| !(r.path == *path && r.accessor_id == *accessor_id));
        Ok((before - inner.perms.len()) as u64)
    }

    async fn get_custom_perm_by_doc_ids(
        &self,
        paths: &[GnsPath],
    ) -> Result<Vec<CustomPermRecord>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: BTreeSet<&GnsPath> = paths.iter().collect();
        let inner = self.read()?;
        let mut records: Vec<CustomPermRecord> = inner
            .perms
            .values()
            .filter(|r| r.is_evaluable() && wanted.contains(&r.path))
            .cloned()
            .collect();
        sort_by_path_then_id(&mut records);
        Ok(records)
    }

    async fn get_custom_perm_by_id(&self, id: i64) -> Result<Option<CustomPermRecord>> {
        Ok(self.read()?.perms.get(&id).cloned())
    }

    async fn get_custom_perm_by_end_time(
        &self,
        path: &GnsPath,
        accessor_id: &PrincipalId,
        accessor_type: AccessorType,
        kind: PermKind,
        end_time: i64,
    ) -> Result<Option<CustomPermRecord>> {
        let inner = self.read()?;
        Ok(inner
            .perms
            .values()
            .find(|r| {
                r.path == *path
                    && r.accessor_id == *accessor_id
                    && r.accessor_type == accessor_type
                    && r.kind == kind
                    && r.end_time == end_time
            })
            .cloned())
    }

    async fn get_custom_perms_by_accessor(
        &self,
        accessor_id: &PrincipalId,
    ) -> Result<Vec<CustomPermRecord>> {
        let inner = self.read()?;
        let mut records: Vec<CustomPermRecord> = inner
            .perms
            .values()
            .filter(|r| r.accessor_id == *accessor_id)
            .cloned()
            .collect();
        sort_by_path_then_id(&mut records);
        Ok(records)
    }

    async fn get_expire_perm_infos(&self, threshold: i64) -> Result<Vec<CustomPermRecord>> {
        let inner = self.read()?;
        let mut records: Vec<CustomPermRecord> = inner
            .perms
            .values()
            .filter(|r| r.kind.is_evaluated() && !r.is_indefinite() && r.end_time < threshold)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.end_time.cmp(&b.end_time).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn get_all_custom_perm(&self) -> Result<Vec<CustomPermRecord>> {
        let inner = self.read()?;
        let mut records: Vec<CustomPermRecord> = inner
            .perms
            .values()
            .filter(|r| r.accessor_type != AccessorType::AnonymousLink)
            .cloned()
            .collect();
        sort_by_path_then_id(&mut records);
        Ok(records)
    }
}

#[async_trait]
impl StrategyStore for MemoryStore {
    async fn get_sharer_strategies(&self, obj_ids: &[PrincipalId]) -> Result<Vec<StrategyRecord>> {
        let inner = self.read()?;
        let mut records: Vec<StrategyRecord> = inner
            .strategies
            .iter()
            .filter(|r| r.role == StrategyRole::Sharer && obj_ids.contains(&r.obj_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.strategy_id.cmp(&b.strategy_id));
        Ok(records)
    }

    async fn get_scope_records(&self, strategy_ids: &[String]) -> Result<Vec<StrategyRecord>> {
        let inner = self.read()?;
        let mut records: Vec<StrategyRecord> = inner
            .strategies
            .iter()
            .filter(|r| r.role == StrategyRole::Scope && strategy_ids.contains(&r.strategy_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.strategy_id.cmp(&b.strategy_id));
        Ok(records)
    }

    async fn get_default_toggle(&self, toggle: DefaultScopeToggle) -> Result<bool> {
        Ok(self.read()?.toggles.get(&toggle).copied().unwrap_or(false))
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn get_user_department_ids(&self, user_id: &PrincipalId) -> Result<Vec<PrincipalId>> {
        let inner = self.read()?;
        Ok(inner
            .memberships
            .get(user_id)
            .map(|depts| depts.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_parent_department_ids(
        &self,
        dept_ids: &[PrincipalId],
    ) -> Result<Vec<PrincipalId>> {
        let inner = self.read()?;
        let parents: BTreeSet<PrincipalId> = dept_ids
            .iter()
            .filter_map(|id| inner.departments.get(id))
            .filter_map(|d| d.parent_id.clone())
            .filter(|p| !p.is_empty())
            .collect();
        Ok(parents.into_iter().collect())
    }

    async fn get_departments(&self, ids: &[PrincipalId]) -> Result<Vec<Department>> {
        let inner = self.read()?;
        let wanted: BTreeSet<&PrincipalId> = ids.iter().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| inner.departments.get(id).cloned())
            .collect())
    }

    async fn is_admin(&self, user_id: &PrincipalId) -> Result<bool> {
        Ok(self
            .read()?
            .accounts
            .get(user_id)
            .map(|(_, admin)| *admin)
            .unwrap_or(false))
    }
}

#[async_trait]
impl DirectoryWriter for MemoryStore {
    async fn put_department(&self, dept: &Department) -> Result<()> {
        let mut dept = dept.clone();
        dept.parent_id = dept.parent_id.filter(|p| !p.is_empty());
        self.write()?.departments.insert(dept.id.clone(), dept);
        Ok(())
    }

    async fn put_user_department(
        &self,
        user_id: &PrincipalId,
        dept_id: &PrincipalId,
    ) -> Result<()> {
        self.write()?
            .memberships
            .entry(user_id.clone())
            .or_default()
            .insert(dept_id.clone());
        Ok(())
    }

    async fn put_account(&self, id: &PrincipalId, name: &str, is_admin: bool) -> Result<()> {
        self.write()?
            .accounts
            .insert(id.clone(), (name.to_string(), is_admin));
        Ok(())
    }

    async fn put_strategy_record(&self, record: &StrategyRecord) -> Result<()> {
        self.write()?.strategies.push(record.clone());
        Ok(())
    }

    async fn set_default_toggle(&self, toggle: DefaultScopeToggle, enabled: bool) -> Result<()> {
        self.write()?.toggles.insert(toggle, enabled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_core::PermBits;

    #[tokio::test]
    async fn test_memory_store_owner_inheritance() {
        let store = MemoryStore::new();
        store
            .add_owners(&[
                OwnerRecord::user("/A/B", "u1", "U1", 1),
                OwnerRecord::department("/A", "d1", "D1", 1),
            ])
            .await
            .unwrap();

        let path = GnsPath::from("/A/B/C");
        assert!(store.is_owner(&path, &"u1".into()).await.unwrap());
        assert!(!store.is_owner(&GnsPath::from("/AB"), &"u1".into()).await.unwrap());

        let inherited = store.get_inherit_owner_infos_by_doc_id(&path, false).await.unwrap();
        assert_eq!(inherited[0].owner_id.as_str(), "d1");
        assert_eq!(inherited[1].owner_id.as_str(), "u1");
    }

    #[tokio::test]
    async fn test_memory_store_ids_increase() {
        let store = MemoryStore::new();
        let record =
            CustomPermRecord::new("/A", "u1", AccessorType::User, PermKind::Allow, PermBits::READ);
        let first = store.add_custom_perm(&record).await.unwrap();
        let second = store.add_custom_perm(&record).await.unwrap();
        assert!(second > first);

        store.delete_custom_perm(second).await.unwrap();
        let third = store.add_custom_perm(&record).await.unwrap();
        assert!(third > second);
    }

    #[tokio::test]
    async fn test_memory_store_dir_delete() {
        let store = MemoryStore::new();
        let mk = |p: &str| {
            CustomPermRecord::new(p, "u1", AccessorType::User, PermKind::Deny, PermBits::EDIT)
        };
        store
            .add_custom_perms(&[mk("/A"), mk("/A/B"), mk("/AB")])
            .await
            .unwrap();

        assert_eq!(
            store.delete_custom_perm_by_dir_id(&GnsPath::from("/A")).await.unwrap(),
            2
        );
        let left = store.get_all_custom_perm().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].path.as_str(), "/AB");
    }

    #[tokio::test]
    async fn test_memory_store_directory() {
        let store = MemoryStore::new();
        store
            .put_department(&Department::organization("org", "Org", 0))
            .await
            .unwrap();
        store
            .put_department(&Department::child("d1", "org", "D1"))
            .await
            .unwrap();
        store
            .put_user_department(&"u1".into(), &"d1".into())
            .await
            .unwrap();

        let depts = store.get_user_department_ids(&"u1".into()).await.unwrap();
        assert_eq!(depts, vec![PrincipalId::from("d1")]);
        let parents = store.get_parent_department_ids(&depts).await.unwrap();
        assert_eq!(parents, vec![PrincipalId::from("org")]);
        assert!(store
            .get_parent_department_ids(&parents)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_empty_parent_is_root() {
        let store = MemoryStore::new();
        let mut org = Department::organization("org", "Org", 0);
        org.parent_id = Some(PrincipalId::empty());
        store.put_department(&org).await.unwrap();

        let depts = store.get_departments(&["org".into()]).await.unwrap();
        assert_eq!(depts.len(), 1);
        assert_eq!(depts[0].parent_id, None);
    }

    #[tokio::test]
    async fn test_memory_store_conditional_delete_skips_renewed() {
        let store = MemoryStore::new();
        let record =
            CustomPermRecord::new("/A", "u1", AccessorType::User, PermKind::Allow, PermBits::READ)
                .expires_at(100);
        let id = store.add_custom_perm(&record).await.unwrap();

        let expired = store.get_expire_perm_infos(200).await.unwrap();
        assert_eq!(expired.len(), 1);

        let mut renewed = expired[0].clone();
        renewed.end_time = 10_000;
        assert!(store.update_custom_perm(&renewed).await.unwrap());

        assert_eq!(store.delete_custom_perm_by_end_time(id, 100).await.unwrap(), 0);
        assert!(store.get_custom_perm_by_id(id).await.unwrap().is_some());
        assert_eq!(store.delete_custom_perm_by_end_time(id, 10_000).await.unwrap(), 1);
    }
}
