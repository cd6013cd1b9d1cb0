use crate::model::{Edge, NodeId, Relation, Resource};

use super::{RelationshipRule, ResourceCatalog, RuleOutput};

/// Every namespaced resource hangs off its namespace node.
#[derive(Debug, Default)]
pub struct NamespaceContainmentRule;

impl RelationshipRule for NamespaceContainmentRule {
    fn name(&self) -> &'static str {
        "namespace-containment"
    }

    fn relation(&self) -> Relation {
        Relation::NamespaceContainment
    }

    fn infer(&self, resource: &Resource, _catalog: &ResourceCatalog) -> RuleOutput {
        let mut out = RuleOutput::default();
        if let Some(ns) = resource.namespace() {
            out.reference(
                Edge::new(NodeId::namespace(ns), resource.id(), Relation::NamespaceContainment)
                    .with_label("contains"),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceKind;
    use serde_json::json;

    #[test]
    fn test_only_namespaced_kinds_are_contained() {
        let cm = Resource::from_json(ResourceKind::ConfigMap, &json!({"metadata": {"name": "c"}})).unwrap();
        let out = NamespaceContainmentRule.infer(&cm, &ResourceCatalog::new());
        assert_eq!(out.edges[0].edge.id.as_str(), "namespace/default->configmap/default/c:namespace-containment");

        let sc = Resource::from_json(ResourceKind::StorageClass, &json!({"metadata": {"name": "fast"}})).unwrap();
        assert!(NamespaceContainmentRule.infer(&sc, &ResourceCatalog::new()).edges.is_empty());
    }
}
