use crate::model::{Edge, NodeId, Relation, Resource, ResourceKind, ResourceSpec};

use super::{RelationshipRule, ResourceCatalog, RuleOutput};

/// RBAC bindings to their subjects and roles, and pods to their service account.
#[derive(Debug, Default)]
pub struct IdentityBindingRule;

impl IdentityBindingRule {
    fn binding(&self, resource: &Resource, out: &mut RuleOutput) {
        let ResourceSpec::Binding(binding) = &resource.spec else {
            return;
        };
        let id = resource.id();
        let cluster_wide = resource.kind == ResourceKind::ClusterRoleBinding;

        for subject in &binding.subjects {
            if subject.kind != "ServiceAccount" {
                out.diagnose(
                    self.name(),
                    &id,
                    format!("subject {} {} is not a modeled identity", subject.kind, subject.name),
                );
                continue;
            }
            let Some(ns) = subject.namespace.as_deref().or(resource.namespace()) else {
                out.diagnose(
                    self.name(),
                    &id,
                    format!("service account subject {} has no namespace", subject.name),
                );
                continue;
            };
            out.reference(
                Edge::new(
                    id.clone(),
                    NodeId::new(ResourceKind::ServiceAccount, Some(ns), &subject.name),
                    Relation::IdentityBinding,
                )
                .with_label("binds"),
            );
        }

        let Some(role_ref) = &binding.role_ref else {
            out.diagnose(self.name(), &id, "binding has no roleRef");
            return;
        };
        let role_kind = match role_ref.kind.as_str() {
            "ClusterRole" => ResourceKind::ClusterRole,
            "Role" if !cluster_wide => ResourceKind::Role,
            other => {
                out.diagnose(
                    self.name(),
                    &id,
                    format!("roleRef kind {} is not valid here", other),
                );
                return;
            }
        };
        out.reference(
            Edge::new(
                id.clone(),
                NodeId::new(role_kind, resource.namespace(), &role_ref.name),
                Relation::IdentityBinding,
            )
            .with_label("grants"),
        );
    }
}

impl RelationshipRule for IdentityBindingRule {
    fn name(&self) -> &'static str {
        "identity-binding"
    }

    fn relation(&self) -> Relation {
        Relation::IdentityBinding
    }

    fn infer(&self, resource: &Resource, _catalog: &ResourceCatalog) -> RuleOutput {
        let mut out = RuleOutput::default();
        match &resource.spec {
            ResourceSpec::Binding(_) => self.binding(resource, &mut out),
            ResourceSpec::Pod(pod) => {
                if let Some(account) = pod.service_account.as_deref().filter(|a| !a.is_empty()) {
                    out.reference(
                        Edge::new(
                            resource.id(),
                            NodeId::new(ResourceKind::ServiceAccount, resource.namespace(), account),
                            Relation::IdentityBinding,
                        )
                        .with_label("runs as"),
                    );
                }
            }
            _ => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cluster_role_binding() {
        let binding = Resource::from_json(
            ResourceKind::ClusterRoleBinding,
            &json!({
                "metadata": {"name": "ops"},
                "roleRef": {"kind": "ClusterRole", "name": "admin"},
                "subjects": [
                    {"kind": "ServiceAccount", "name": "deployer", "namespace": "ci"},
                    {"kind": "User", "name": "alice"}
                ]
            }),
        )
        .unwrap();

        let out = IdentityBindingRule.infer(&binding, &ResourceCatalog::new());
        let targets: Vec<_> = out.edges.iter().map(|e| e.edge.target.as_str()).collect();
        assert_eq!(targets, vec!["serviceaccount/ci/deployer", "clusterrole/admin"]);
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn test_role_binding_defaults_subject_namespace() {
        let binding = Resource::from_json(
            ResourceKind::RoleBinding,
            &json!({
                "metadata": {"name": "read", "namespace": "app"},
                "roleRef": {"kind": "Role", "name": "reader"},
                "subjects": [{"kind": "ServiceAccount", "name": "web"}]
            }),
        )
        .unwrap();

        let out = IdentityBindingRule.infer(&binding, &ResourceCatalog::new());
        let targets: Vec<_> = out.edges.iter().map(|e| e.edge.target.as_str()).collect();
        assert_eq!(targets, vec!["serviceaccount/app/web", "role/app/reader"]);
    }

    #[test]
    fn test_pod_service_account() {
        let pod = Resource::from_json(
            ResourceKind::Pod,
            &json!({"metadata": {"name": "p", "namespace": "app"}, "spec": {"serviceAccountName": "web"}}),
        )
        .unwrap();
        let out = IdentityBindingRule.infer(&pod, &ResourceCatalog::new());
        assert_eq!(out.edges[0].edge.label.as_deref(), Some("runs as"));
    }
}
