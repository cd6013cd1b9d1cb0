//! Read-only index of known resources handed to rules.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::model::{NodeId, Resource, ResourceKind};

/// Every resource currently known to the builder, indexed by id and by
/// (namespace, kind).
#[derive(Debug, Default)]
pub struct ResourceCatalog {
    resources: HashMap<NodeId, Arc<Resource>>,
    by_scope: HashMap<(String, ResourceKind), BTreeSet<NodeId>>,
}

impl ResourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a resource. Returns the previous version.
    pub fn insert(&mut self, resource: Arc<Resource>) -> Option<Arc<Resource>> {
        let id = resource.id();
        if let Some(ns) = resource.namespace() {
            self.by_scope
                .entry((ns.to_string(), resource.kind))
                .or_default()
                .insert(id.clone());
        }
        self.resources.insert(id, resource)
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<Arc<Resource>> {
        let removed = self.resources.remove(id)?;
        if let Some(ns) = removed.namespace() {
            let key = (ns.to_string(), removed.kind);
            if let Some(ids) = self.by_scope.get_mut(&key) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_scope.remove(&key);
                }
            }
        }
        Some(removed)
    }

    pub fn get(&self, id: &NodeId) -> Option<&Arc<Resource>> {
        self.resources.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.resources.contains_key(id)
    }

    /// Resources of `kind` in namespace `ns`, in id order.
    pub fn in_namespace<'a>(
        &'a self,
        ns: &str,
        kind: ResourceKind,
    ) -> impl Iterator<Item = &'a Arc<Resource>> + 'a {
        self.by_scope
            .get(&(ns.to_string(), kind))
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.resources.get(id))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod(ns: &str, name: &str) -> Arc<Resource> {
        Arc::new(
            Resource::from_json(
                ResourceKind::Pod,
                &json!({"metadata": {"name": name, "namespace": ns}}),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_namespace_index() {
        let mut catalog = ResourceCatalog::new();
        catalog.insert(pod("a", "p2"));
        catalog.insert(pod("a", "p1"));
        catalog.insert(pod("b", "p3"));

        let names: Vec<_> = catalog
            .in_namespace("a", ResourceKind::Pod)
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["p1", "p2"]);

        catalog.remove(&NodeId::new(ResourceKind::Pod, Some("a"), "p1"));
        assert_eq!(catalog.in_namespace("a", ResourceKind::Pod).count(), 1);
        assert_eq!(catalog.in_namespace("a", ResourceKind::Service).count(), 0);
        assert_eq!(catalog.len(), 2);
    }
}
