//! Scope resolution.
//!
//! A user's scope is built in four steps:
//!
//! 1. If the user is named as a sharer, those strategies apply.
//! 2. Otherwise every department above the user is a candidate sharer. A
//!    candidate lying on another candidate's root path is dropped, so only
//!    the most specific sharer of a chain contributes.
//! 3. The scope rows of the chosen strategies become scope objects. A user
//!    row whose department is not one of that user's direct departments is
//!    stale and skipped.
//! 4. If the superimpose flag is on, or nothing was found, the default
//!    toggles add the user's direct departments (`"-1"`) and direct
//!    organizations (`"-2"`).
//!
//! Nothing is cached; every call re-reads strategies and the directory.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use docgate_core::{
    DefaultScopeToggle, OrgInfo, PrincipalId, PrincipalType, ScopeMap, StrategyRecord,
};
use docgate_store::{Directory, StrategyStore};

use crate::config::ScopeConfig;
use crate::error::Result;
use crate::hierarchy::{ancestor_closure, OrgChart};

/// Computes and queries sharing scopes.
pub struct ScopeEngine<S> {
    store: Arc<S>,
    config: ScopeConfig,
}

impl<S> Clone for ScopeEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: StrategyStore + Directory> ScopeEngine<S> {
    /// Create an engine over `store`.
    pub fn new(store: Arc<S>, config: ScopeConfig) -> Self {
        Self { store, config }
    }

    /// The active settings.
    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// The user's direct departments followed by every department above
    /// them, without duplicates.
    pub async fn ancestor_department_ids(&self, user_id: &PrincipalId) -> Result<Vec<PrincipalId>> {
        let direct = self.store.get_user_department_ids(user_id).await?;
        ancestor_closure(self.store.as_ref(), direct).await
    }

    /// Departments above `dept_id`, nearest first, excluding itself.
    pub async fn department_root_path(&self, dept_id: &PrincipalId) -> Result<Vec<PrincipalId>> {
        let mut closure = ancestor_closure(self.store.as_ref(), vec![dept_id.clone()]).await?;
        closure.retain(|id| id != dept_id);
        Ok(closure)
    }

    /// Compute the scope of `user_id`.
    pub async fn get_user_perm_scope_infos(&self, user_id: &PrincipalId) -> Result<ScopeMap> {
        let direct = self.store.get_user_department_ids(user_id).await?;

        let strategy_ids = match self.explicit_strategies(user_id).await? {
            Some(ids) => ids,
            None => self.inherited_strategies(&direct).await?,
        };

        let mut scope = self.scope_from_strategies(&strategy_ids).await?;

        if self.config.superimpose_default_scope || scope.is_empty() {
            scope.extend(self.default_scope(&direct).await?);
        }

        tracing::debug!(
            user = %user_id,
            strategies = strategy_ids.len(),
            entries = scope.len(),
            "resolved sharing scope"
        );
        Ok(scope)
    }

    /// Whether `check_user_id` is in the scope of `user_id`.
    ///
    /// Always true when the share limit is disabled.
    pub async fn check_usr_in_perm_scope(
        &self,
        user_id: &PrincipalId,
        check_user_id: &PrincipalId,
    ) -> Result<bool> {
        if !self.config.share_limit_enabled || user_id == check_user_id {
            return Ok(true);
        }
        let scope = self.get_user_perm_scope_infos(user_id).await?;
        self.user_reachable(&scope, check_user_id).await
    }

    /// Whether `check_dept_id`, or a department above it, is in the scope of
    /// `user_id`.
    pub async fn check_dept_in_perm_scope(
        &self,
        user_id: &PrincipalId,
        check_dept_id: &PrincipalId,
    ) -> Result<bool> {
        let scope = self.get_user_perm_scope_infos(user_id).await?;
        if scope.contains_id(check_dept_id) {
            return Ok(true);
        }
        let root_path = self.department_root_path(check_dept_id).await?;
        Ok(root_path.iter().any(|id| scope.contains_id(id)))
    }

    /// The organizations the members of `scope` belong to, by ascending
    /// priority and then case-insensitive name.
    pub async fn get_org_ids_by_scope_info(&self, scope: &ScopeMap) -> Result<Vec<OrgInfo>> {
        let mut seeds = Vec::new();
        for object in scope.objects() {
            match object.kind {
                PrincipalType::Department => seeds.push(object.id.clone()),
                PrincipalType::User if !object.parent_id.is_empty() => {
                    seeds.push(object.parent_id.clone())
                }
                PrincipalType::User => {
                    seeds.extend(self.store.get_user_department_ids(&object.id).await?)
                }
            }
        }

        let closure = ancestor_closure(self.store.as_ref(), seeds).await?;
        let chart = OrgChart::load(self.store.as_ref(), &closure).await?;

        let mut orgs: Vec<OrgInfo> = chart
            .organizations()
            .map(|d| OrgInfo {
                id: d.id.clone(),
                name: d.name.clone(),
                priority: d.priority,
            })
            .collect();
        orgs.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(orgs)
    }

    /// The candidates `user_id` cannot reach, in input order.
    ///
    /// The user itself and administrator accounts are never reported.
    /// Nothing is out of scope when the share limit is disabled.
    pub async fn get_usrs_out_of_perm_scope(
        &self,
        user_id: &PrincipalId,
        candidate_ids: &[PrincipalId],
    ) -> Result<Vec<PrincipalId>> {
        if !self.config.share_limit_enabled || candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let scope = self.get_user_perm_scope_infos(user_id).await?;
        let mut out = Vec::new();
        for candidate in candidate_ids {
            if candidate == user_id || self.store.is_admin(candidate).await? {
                continue;
            }
            if !self.user_reachable(&scope, candidate).await? {
                out.push(candidate.clone());
            }
        }
        Ok(out)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Steps
    // ─────────────────────────────────────────────────────────────────────────

    /// Strategies naming the user directly as a sharer, or `None`.
    async fn explicit_strategies(&self, user_id: &PrincipalId) -> Result<Option<Vec<String>>> {
        let records = self
            .store
            .get_sharer_strategies(std::slice::from_ref(user_id))
            .await?;
        let ids = strategy_ids(records.iter().filter(|r| r.obj_type == PrincipalType::User));
        Ok((!ids.is_empty()).then_some(ids))
    }

    /// Strategies of the most specific departments above the user that are
    /// configured as sharers.
    async fn inherited_strategies(&self, direct: &[PrincipalId]) -> Result<Vec<String>> {
        let ancestors = ancestor_closure(self.store.as_ref(), direct.to_vec()).await?;
        if ancestors.is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<StrategyRecord> = self
            .store
            .get_sharer_strategies(&ancestors)
            .await?
            .into_iter()
            .filter(|r| r.obj_type == PrincipalType::Department)
            .collect();
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let candidates: BTreeSet<PrincipalId> = records.iter().map(|r| r.obj_id.clone()).collect();
        let chart = OrgChart::load(self.store.as_ref(), &ancestors).await?;
        let implied: HashSet<PrincipalId> = candidates
            .iter()
            .flat_map(|c| chart.root_path(c))
            .collect();

        for pruned in candidates.iter().filter(|c| implied.contains(*c)) {
            tracing::debug!(sharer = %pruned, "ancestor sharer pruned");
        }

        Ok(strategy_ids(
            records.iter().filter(|r| !implied.contains(&r.obj_id)),
        ))
    }

    /// Scope objects configured for `strategy_ids`.
    async fn scope_from_strategies(&self, strategy_ids: &[String]) -> Result<ScopeMap> {
        let mut scope = ScopeMap::new();
        if strategy_ids.is_empty() {
            return Ok(scope);
        }

        let mut memberships: HashMap<PrincipalId, Vec<PrincipalId>> = HashMap::new();
        for record in self.store.get_scope_records(strategy_ids).await? {
            match record.obj_type {
                PrincipalType::Department => scope.insert_department(record.obj_id),
                PrincipalType::User => {
                    if !memberships.contains_key(&record.obj_id) {
                        let depts = self.store.get_user_department_ids(&record.obj_id).await?;
                        memberships.insert(record.obj_id.clone(), depts);
                    }
                    let valid = memberships
                        .get(&record.obj_id)
                        .is_some_and(|depts| depts.contains(&record.parent_id));
                    if valid {
                        scope.insert_user(record.obj_id, record.parent_id);
                    } else {
                        tracing::debug!(
                            strategy = %record.strategy_id,
                            user = %record.obj_id,
                            parent = %record.parent_id,
                            "stale scope row skipped"
                        );
                    }
                }
            }
        }
        Ok(scope)
    }

    /// Scope contributed by the default toggles.
    async fn default_scope(&self, direct: &[PrincipalId]) -> Result<ScopeMap> {
        let mut scope = ScopeMap::new();
        if direct.is_empty() {
            return Ok(scope);
        }

        if self
            .store
            .get_default_toggle(DefaultScopeToggle::DirectDepartment)
            .await?
        {
            for dept in direct {
                scope.insert_department(dept.clone());
            }
        }

        if self
            .store
            .get_default_toggle(DefaultScopeToggle::DirectOrganization)
            .await?
        {
            let closure = ancestor_closure(self.store.as_ref(), direct.to_vec()).await?;
            let chart = OrgChart::load(self.store.as_ref(), &closure).await?;
            for dept in direct {
                if let Some(org) = chart.root_organization(dept) {
                    scope.insert_department(org.id.clone());
                }
            }
        }

        Ok(scope)
    }

    /// Whether `user` is in `scope` directly or through a department above
    /// it.
    async fn user_reachable(&self, scope: &ScopeMap, user: &PrincipalId) -> Result<bool> {
        if scope.contains_id(user) {
            return Ok(true);
        }
        let ancestors = self.ancestor_department_ids(user).await?;
        Ok(ancestors.iter().any(|id| scope.contains_id(id)))
    }
}

/// Distinct strategy ids, in first-seen order.
fn strategy_ids<'a>(records: impl Iterator<Item = &'a StrategyRecord>) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .filter(|r| seen.insert(r.strategy_id.clone()))
        .map(|r| r.strategy_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_core::{Department, ScopeKey, StrategyRole};
    use docgate_store::{DirectoryWriter, MemoryStore};

    fn sharer(strategy: &str, obj: &str, obj_type: PrincipalType) -> StrategyRecord {
        StrategyRecord {
            strategy_id: strategy.into(),
            obj_id: obj.into(),
            obj_type,
            parent_id: PrincipalId::empty(),
            role: StrategyRole::Sharer,
        }
    }

    fn scope_dept(strategy: &str, obj: &str) -> StrategyRecord {
        StrategyRecord {
            strategy_id: strategy.into(),
            obj_id: obj.into(),
            obj_type: PrincipalType::Department,
            parent_id: PrincipalId::empty(),
            role: StrategyRole::Scope,
        }
    }

    fn scope_user(strategy: &str, obj: &str, parent: &str) -> StrategyRecord {
        StrategyRecord {
            strategy_id: strategy.into(),
            obj_id: obj.into(),
            obj_type: PrincipalType::User,
            parent_id: parent.into(),
            role: StrategyRole::Scope,
        }
    }

    /// org(D0) > D1 > D2, plus a second organization X0 > X1.
    /// u1 in D1, u2 in D2, ux in X1, admin in X1.
    async fn org_chart() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        for dept in [
            Department::organization("D0", "Zeta", 2),
            Department::child("D1", "D0", "D1"),
            Department::child("D2", "D1", "D2"),
            Department::organization("X0", "alpha", 2),
            Department::child("X1", "X0", "X1"),
        ] {
            store.put_department(&dept).await.unwrap();
        }
        for (user, dept) in [("u1", "D1"), ("u2", "D2"), ("ux", "X1"), ("admin", "X1")] {
            store
                .put_user_department(&user.into(), &dept.into())
                .await
                .unwrap();
        }
        store.put_account(&"admin".into(), "admin", true).await.unwrap();
        Arc::new(store)
    }

    fn engine(store: Arc<MemoryStore>) -> ScopeEngine<MemoryStore> {
        ScopeEngine::new(store, ScopeConfig::default())
    }

    #[tokio::test]
    async fn test_direct_department_toggle_only() {
        let store = org_chart().await;
        store
            .set_default_toggle(DefaultScopeToggle::DirectDepartment, true)
            .await
            .unwrap();
        store
            .set_default_toggle(DefaultScopeToggle::DirectOrganization, false)
            .await
            .unwrap();

        let scope = engine(store)
            .get_user_perm_scope_infos(&"u1".into())
            .await
            .unwrap();
        assert_eq!(scope.len(), 1);
        let object = scope.get(&ScopeKey::Id("D1".into())).unwrap();
        assert_eq!(object.kind, PrincipalType::Department);
    }

    #[tokio::test]
    async fn test_direct_organization_toggle() {
        let store = org_chart().await;
        store
            .set_default_toggle(DefaultScopeToggle::DirectOrganization, true)
            .await
            .unwrap();

        let scope = engine(store)
            .get_user_perm_scope_infos(&"u2".into())
            .await
            .unwrap();
        assert!(scope.contains_id(&"D0".into()));
        assert_eq!(scope.len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_sharer() {
        let store = org_chart().await;
        store
            .put_strategy_record(&sharer("s1", "u1", PrincipalType::User))
            .await
            .unwrap();
        store.put_strategy_record(&scope_dept("s1", "X1")).await.unwrap();
        store
            .put_strategy_record(&scope_user("s1", "u2", "D2"))
            .await
            .unwrap();
        // Stale: ux is not a member of D2.
        store
            .put_strategy_record(&scope_user("s1", "ux", "D2"))
            .await
            .unwrap();

        let scope = engine(store)
            .get_user_perm_scope_infos(&"u1".into())
            .await
            .unwrap();
        assert!(scope.contains_id(&"X1".into()));
        assert!(scope.contains(&"u2".into(), Some(&"D2".into())));
        assert!(scope
            .get(&ScopeKey::Member {
                id: "u2".into(),
                parent_id: "D2".into()
            })
            .is_some());
        assert!(!scope.contains_id(&"ux".into()));
    }

    #[tokio::test]
    async fn test_ancestor_sharer_pruned() {
        let store = org_chart().await;
        store
            .put_strategy_record(&sharer("broad", "D0", PrincipalType::Department))
            .await
            .unwrap();
        store.put_strategy_record(&scope_dept("broad", "X0")).await.unwrap();
        store
            .put_strategy_record(&sharer("narrow", "D1", PrincipalType::Department))
            .await
            .unwrap();
        store.put_strategy_record(&scope_dept("narrow", "X1")).await.unwrap();

        let engine = engine(store);
        let scope = engine.get_user_perm_scope_infos(&"u2".into()).await.unwrap();
        assert!(scope.contains_id(&"X1".into()));
        assert!(!scope.contains_id(&"X0".into()));
    }

    #[tokio::test]
    async fn test_defaults_only_when_empty_unless_superimposed() {
        let store = org_chart().await;
        store
            .set_default_toggle(DefaultScopeToggle::DirectDepartment, true)
            .await
            .unwrap();
        store
            .put_strategy_record(&sharer("s1", "u1", PrincipalType::User))
            .await
            .unwrap();
        store.put_strategy_record(&scope_dept("s1", "X1")).await.unwrap();

        let plain = ScopeEngine::new(Arc::clone(&store), ScopeConfig::default());
        let scope = plain.get_user_perm_scope_infos(&"u1".into()).await.unwrap();
        assert!(!scope.contains_id(&"D1".into()));

        let superimposed = ScopeEngine::new(
            store,
            ScopeConfig {
                superimpose_default_scope: true,
                ..ScopeConfig::default()
            },
        );
        let scope = superimposed
            .get_user_perm_scope_infos(&"u1".into())
            .await
            .unwrap();
        assert!(scope.contains_id(&"D1".into()));
        assert!(scope.contains_id(&"X1".into()));
    }

    #[tokio::test]
    async fn test_unassigned_user_has_empty_scope() {
        let store = org_chart().await;
        store
            .set_default_toggle(DefaultScopeToggle::DirectDepartment, true)
            .await
            .unwrap();
        let scope = engine(store)
            .get_user_perm_scope_infos(&"nobody".into())
            .await
            .unwrap();
        assert!(scope.is_empty());
    }

    #[tokio::test]
    async fn test_check_usr_in_perm_scope() {
        let store = org_chart().await;
        store
            .put_strategy_record(&sharer("s1", "u1", PrincipalType::User))
            .await
            .unwrap();
        store.put_strategy_record(&scope_dept("s1", "D1")).await.unwrap();

        let engine = engine(Arc::clone(&store));
        assert!(engine.check_usr_in_perm_scope(&"u1".into(), &"u1".into()).await.unwrap());
        // u2 sits in D2, below D1.
        assert!(engine.check_usr_in_perm_scope(&"u1".into(), &"u2".into()).await.unwrap());
        assert!(!engine.check_usr_in_perm_scope(&"u1".into(), &"ux".into()).await.unwrap());

        let unlimited = ScopeEngine::new(
            store,
            ScopeConfig {
                share_limit_enabled: false,
                ..ScopeConfig::default()
            },
        );
        assert!(unlimited
            .check_usr_in_perm_scope(&"u1".into(), &"ux".into())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_check_dept_in_perm_scope() {
        let store = org_chart().await;
        store
            .put_strategy_record(&sharer("s1", "u1", PrincipalType::User))
            .await
            .unwrap();
        store.put_strategy_record(&scope_dept("s1", "D1")).await.unwrap();

        let engine = engine(store);
        assert!(engine.check_dept_in_perm_scope(&"u1".into(), &"D1".into()).await.unwrap());
        assert!(engine.check_dept_in_perm_scope(&"u1".into(), &"D2".into()).await.unwrap());
        assert!(!engine.check_dept_in_perm_scope(&"u1".into(), &"D0".into()).await.unwrap());
        assert!(!engine.check_dept_in_perm_scope(&"u1".into(), &"X1".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_org_ids_sorted_by_priority_then_name() {
        let store = org_chart().await;
        let mut scope = ScopeMap::new();
        scope.insert_department("D2".into());
        scope.insert_user("ux".into(), "X1".into());
        scope.insert_department("D1".into());

        let orgs = engine(store).get_org_ids_by_scope_info(&scope).await.unwrap();
        let ids: Vec<&str> = orgs.iter().map(|o| o.id.as_str()).collect();
        // Equal priority: "alpha" sorts before "Zeta" ignoring case.
        assert_eq!(ids, vec!["X0", "D0"]);
    }

    #[tokio::test]
    async fn test_usrs_out_of_perm_scope() {
        let store = org_chart().await;
        store
            .put_strategy_record(&sharer("s1", "u1", PrincipalType::User))
            .await
            .unwrap();
        store.put_strategy_record(&scope_dept("s1", "D1")).await.unwrap();

        let engine = engine(store);
        let out = engine
            .get_usrs_out_of_perm_scope(
                &"u1".into(),
                &["u1".into(), "u2".into(), "ux".into(), "admin".into(), "ghost".into()],
            )
            .await
            .unwrap();
        assert_eq!(out, vec![PrincipalId::from("ux"), "ghost".into()]);
    }
}
