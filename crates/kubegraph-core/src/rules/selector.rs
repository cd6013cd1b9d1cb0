use crate::model::{Edge, Relation, Resource, ResourceKind, ResourceSpec};

use super::{RelationshipRule, ResourceCatalog, RuleOutput};

/// Kinds that group pods with a label selector.
const SELECTOR_HOLDERS: &[ResourceKind] = &[
    ResourceKind::Deployment,
    ResourceKind::ReplicaSet,
    ResourceKind::StatefulSet,
    ResourceKind::DaemonSet,
    ResourceKind::Job,
    ResourceKind::Service,
    ResourceKind::NetworkPolicy,
];

/// Workloads, services and network policies select the pods whose labels
/// satisfy their selector.
#[derive(Debug, Default)]
pub struct SelectorMatchRule;

impl RelationshipRule for SelectorMatchRule {
    fn name(&self) -> &'static str {
        "selector-match"
    }

    fn relation(&self) -> Relation {
        Relation::SelectorMatch
    }

    fn infer(&self, resource: &Resource, catalog: &ResourceCatalog) -> RuleOutput {
        let mut out = RuleOutput::default();
        if !SELECTOR_HOLDERS.contains(&resource.kind) {
            return out;
        }
        let id = resource.id();

        let problems = match &resource.spec {
            ResourceSpec::Workload(spec) => spec.selector_problems.as_slice(),
            ResourceSpec::Policy(spec) => spec.selector_problems.as_slice(),
            _ => &[],
        };
        for problem in problems {
            out.diagnose(self.name(), &id, problem.clone());
        }

        let (Some(selector), Some(ns)) = (resource.selector(), resource.namespace()) else {
            return out;
        };
        if selector.is_empty() {
            out.diagnose(self.name(), &id, "empty selector matches nothing");
            return out;
        }

        for pod in catalog.in_namespace(ns, ResourceKind::Pod) {
            if selector.matches(pod.labels()) {
                out.selected(Self::edge(resource, pod));
            }
        }
        out
    }

    fn selector_kinds(&self, target: ResourceKind) -> &'static [ResourceKind] {
        if target == ResourceKind::Pod {
            SELECTOR_HOLDERS
        } else {
            &[]
        }
    }

    fn infer_pair(&self, holder: &Resource, target: &Resource) -> Option<Edge> {
        if !SELECTOR_HOLDERS.contains(&holder.kind)
            || target.kind != ResourceKind::Pod
            || holder.namespace() != target.namespace()
        {
            return None;
        }
        holder
            .selector()
            .filter(|s| s.matches(target.labels()))
            .map(|_| Self::edge(holder, target))
    }
}

impl SelectorMatchRule {
    fn edge(holder: &Resource, pod: &Resource) -> Edge {
        let label = if holder.kind == ResourceKind::NetworkPolicy {
            "applies to"
        } else {
            "selects"
        };
        Edge::new(holder.id(), pod.id(), Relation::SelectorMatch).with_label(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn resource(kind: ResourceKind, value: serde_json::Value) -> Arc<Resource> {
        Arc::new(Resource::from_json(kind, &value).unwrap())
    }

    #[test]
    fn test_workload_selects_matching_pods_in_namespace() {
        let mut catalog = ResourceCatalog::new();
        catalog.insert(resource(
            ResourceKind::Pod,
            json!({"metadata": {"name": "a", "namespace": "ns", "labels": {"app": "foo"}}}),
        ));
        catalog.insert(resource(
            ResourceKind::Pod,
            json!({"metadata": {"name": "b", "namespace": "ns", "labels": {"app": "bar"}}}),
        ));
        catalog.insert(resource(
            ResourceKind::Pod,
            json!({"metadata": {"name": "c", "namespace": "other", "labels": {"app": "foo"}}}),
        ));
        let deploy = resource(
            ResourceKind::Deployment,
            json!({
                "metadata": {"name": "d", "namespace": "ns"},
                "spec": {"selector": {"matchLabels": {"app": "foo"}}}
            }),
        );

        let out = SelectorMatchRule.infer(&deploy, &catalog);
        let targets: Vec<_> = out.edges.iter().map(|e| e.edge.target.as_str()).collect();
        assert_eq!(targets, vec!["pod/ns/a"]);

        let pod_b = catalog
            .get(&crate::model::NodeId::new(ResourceKind::Pod, Some("ns"), "b"))
            .unwrap();
        assert!(SelectorMatchRule.infer_pair(&deploy, pod_b).is_none());
    }

    #[test]
    fn test_missing_selector_yields_nothing() {
        let deploy = resource(
            ResourceKind::Deployment,
            json!({"metadata": {"name": "d", "namespace": "ns"}}),
        );
        let out = SelectorMatchRule.infer(&deploy, &ResourceCatalog::new());
        assert!(out.edges.is_empty());
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_network_policy_applies_to_selected_pods() {
        let mut catalog = ResourceCatalog::new();
        catalog.insert(resource(
            ResourceKind::Pod,
            json!({"metadata": {"name": "api", "namespace": "ns", "labels": {"tier": "backend"}}}),
        ));
        catalog.insert(resource(
            ResourceKind::Pod,
            json!({"metadata": {"name": "web", "namespace": "ns", "labels": {"tier": "frontend"}}}),
        ));
        let policy = resource(
            ResourceKind::NetworkPolicy,
            json!({
                "metadata": {"name": "deny-backend", "namespace": "ns"},
                "spec": {
                    "podSelector": {"matchExpressions": [{"key": "tier", "operator": "In", "values": ["backend"]}]},
                    "policyTypes": ["Ingress"]
                }
            }),
        );
        assert_eq!(policy.attributes.get("policyTypes"), Some(&json!(["Ingress"])));

        let out = SelectorMatchRule.infer(&policy, &catalog);
        assert_eq!(out.edges.len(), 1);
        let edge = &out.edges[0];
        assert_eq!(edge.edge.source.as_str(), "networkpolicy/ns/deny-backend");
        assert_eq!(edge.edge.target.as_str(), "pod/ns/api");
        assert_eq!(edge.edge.label.as_deref(), Some("applies to"));
        assert_eq!(edge.origin, crate::rules::EdgeOrigin::Selector);

        assert!(SelectorMatchRule
            .selector_kinds(ResourceKind::Pod)
            .contains(&ResourceKind::NetworkPolicy));
        let web = catalog
            .get(&crate::model::NodeId::new(ResourceKind::Pod, Some("ns"), "web"))
            .unwrap();
        assert!(SelectorMatchRule.infer_pair(&policy, web).is_none());
    }

    #[test]
    fn test_network_policy_with_empty_pod_selector_is_diagnosed() {
        let mut catalog = ResourceCatalog::new();
        catalog.insert(resource(
            ResourceKind::Pod,
            json!({"metadata": {"name": "api", "namespace": "ns", "labels": {"tier": "backend"}}}),
        ));
        let policy = resource(
            ResourceKind::NetworkPolicy,
            json!({"metadata": {"name": "default-deny", "namespace": "ns"}, "spec": {"podSelector": {}}}),
        );

        let out = SelectorMatchRule.infer(&policy, &catalog);
        assert!(out.edges.is_empty());
        assert_eq!(out.diagnostics.len(), 1);
    }
}
