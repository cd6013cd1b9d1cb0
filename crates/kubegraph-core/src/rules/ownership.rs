use crate::model::{Edge, NodeId, Relation, Resource, ResourceKind};

use super::{RelationshipRule, ResourceCatalog, RuleOutput};

/// `ownerReferences` entries become owner -> owned edges.
#[derive(Debug, Default)]
pub struct OwnershipRule;

impl RelationshipRule for OwnershipRule {
    fn name(&self) -> &'static str {
        "ownership"
    }

    fn relation(&self) -> Relation {
        Relation::Ownership
    }

    fn infer(&self, resource: &Resource, _catalog: &ResourceCatalog) -> RuleOutput {
        let mut out = RuleOutput::default();
        let id = resource.id();

        for owner in &resource.meta.owner_references {
            let kind = match owner.kind.parse::<ResourceKind>() {
                Ok(kind) => kind,
                Err(_) => {
                    out.diagnose(
                        self.name(),
                        &id,
                        format!("owner {}/{} has an unmodeled kind", owner.kind, owner.name),
                    );
                    continue;
                }
            };
            let owner_id = NodeId::new(kind, resource.namespace(), &owner.name);
            if owner_id == id {
                out.diagnose(self.name(), &id, "resource lists itself as owner");
                continue;
            }
            out.reference(Edge::new(owner_id, id.clone(), Relation::Ownership).with_label("owns"));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_owner_edges() {
        let pod = Resource::from_json(
            ResourceKind::Pod,
            &json!({"metadata": {
                "name": "web-abc-1",
                "namespace": "shop",
                "ownerReferences": [
                    {"kind": "ReplicaSet", "name": "web-abc", "controller": true},
                    {"kind": "Node", "name": "worker-1"}
                ]
            }}),
        )
        .unwrap();

        let out = OwnershipRule.infer(&pod, &ResourceCatalog::new());
        assert_eq!(out.edges.len(), 1);
        let edge = &out.edges[0].edge;
        assert_eq!(edge.source.as_str(), "replicaset/shop/web-abc");
        assert_eq!(edge.target.as_str(), "pod/shop/web-abc-1");
        assert_eq!(edge.label.as_deref(), Some("owns"));
        assert_eq!(out.diagnostics.len(), 1);
    }
}
