//! Walks over the department hierarchy.
//!
//! The directory only answers one level at a time, so walks proceed
//! frontier by frontier. Every walk keeps a visited set, which makes a
//! misconfigured hierarchy with cycles terminate instead of looping.

use std::collections::{HashMap, HashSet};

use docgate_core::{Department, PrincipalId};
use docgate_store::Directory;

use crate::error::Result;

/// `seeds` followed by all of their ancestors, breadth first, without
/// duplicates.
pub async fn ancestor_closure<D>(dir: &D, seeds: Vec<PrincipalId>) -> Result<Vec<PrincipalId>>
where
    D: Directory + ?Sized,
{
    let mut visited: HashSet<PrincipalId> = HashSet::new();
    let mut out = Vec::new();
    let mut frontier = Vec::new();
    for id in seeds {
        if visited.insert(id.clone()) {
            out.push(id.clone());
            frontier.push(id);
        }
    }

    while !frontier.is_empty() {
        let parents = dir.get_parent_department_ids(&frontier).await?;
        frontier = parents
            .into_iter()
            .filter(|p| visited.insert(p.clone()))
            .collect();
        out.extend(frontier.iter().cloned());
    }

    Ok(out)
}

/// A loaded slice of the department tree.
#[derive(Debug, Default)]
pub struct OrgChart {
    nodes: HashMap<PrincipalId, Department>,
}

impl OrgChart {
    /// Load the nodes for `ids`. Unknown ids are simply absent.
    pub async fn load<D>(dir: &D, ids: &[PrincipalId]) -> Result<Self>
    where
        D: Directory + ?Sized,
    {
        let nodes = dir
            .get_departments(ids)
            .await?
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();
        Ok(Self { nodes })
    }

    /// Look up a loaded node.
    pub fn get(&self, id: &PrincipalId) -> Option<&Department> {
        self.nodes.get(id)
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn root_path(&self, id: &PrincipalId) -> Vec<PrincipalId> {
        let mut path = Vec::new();
        let mut seen = HashSet::from([id.clone()]);
        let mut current = self.nodes.get(id).and_then(|d| d.parent_id.clone());
        while let Some(parent) = current {
            if !seen.insert(parent.clone()) {
                break;
            }
            current = self.nodes.get(&parent).and_then(|d| d.parent_id.clone());
            path.push(parent);
        }
        path
    }

    /// The organization at the top of `id`'s chain, if that root is flagged
    /// as an enterprise.
    pub fn root_organization(&self, id: &PrincipalId) -> Option<&Department> {
        let top = self.root_path(id).pop().unwrap_or_else(|| id.clone());
        self.nodes
            .get(&top)
            .filter(|d| d.is_enterprise && d.parent_id.is_none())
    }

    /// Every loaded root organization.
    pub fn organizations(&self) -> impl Iterator<Item = &Department> {
        self.nodes
            .values()
            .filter(|d| d.is_enterprise && d.parent_id.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_store::{DirectoryWriter, MemoryStore};

    async fn chain() -> MemoryStore {
        let store = MemoryStore::new();
        for dept in [
            Department::organization("org", "Org", 0),
            Department::child("d1", "org", "D1"),
            Department::child("d2", "d1", "D2"),
        ] {
            store.put_department(&dept).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_ancestor_closure() {
        let store = chain().await;
        let ids = ancestor_closure(&store, vec!["d2".into()]).await.unwrap();
        assert_eq!(
            ids,
            vec![PrincipalId::from("d2"), "d1".into(), "org".into()]
        );
    }

    #[tokio::test]
    async fn test_root_path_and_organization() {
        let store = chain().await;
        let ids = ancestor_closure(&store, vec!["d2".into()]).await.unwrap();
        let chart = OrgChart::load(&store, &ids).await.unwrap();

        assert_eq!(
            chart.root_path(&"d2".into()),
            vec![PrincipalId::from("d1"), "org".into()]
        );
        assert!(chart.root_path(&"org".into()).is_empty());
        assert_eq!(
            chart.root_organization(&"d2".into()).map(|d| d.id.as_str()),
            Some("org")
        );
        assert_eq!(
            chart.root_organization(&"org".into()).map(|d| d.id.as_str()),
            Some("org")
        );
    }

    #[tokio::test]
    async fn test_cycles_terminate() {
        let store = MemoryStore::new();
        store
            .put_department(&Department::child("a", "b", "A"))
            .await
            .unwrap();
        store
            .put_department(&Department::child("b", "a", "B"))
            .await
            .unwrap();

        let ids = ancestor_closure(&store, vec!["a".into()]).await.unwrap();
        assert_eq!(ids.len(), 2);

        let chart = OrgChart::load(&store, &ids).await.unwrap();
        assert_eq!(chart.root_path(&"a".into()), vec![PrincipalId::from("b")]);
        assert!(chart.root_organization(&"a".into()).is_none());
    }
}
