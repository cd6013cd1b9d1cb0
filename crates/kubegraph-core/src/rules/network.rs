use crate::model::{
    Edge, NodeId, Relation, Resource, ResourceKind, ResourceSpec, ServiceSpec, TargetPort,
};

use super::{RelationshipRule, ResourceCatalog, RuleOutput};

/// Traffic paths: service -> backing pod and ingress -> backend service.
///
/// A service routes to a pod when its selector matches the pod and at least
/// one service port lands on a port the pod exposes.
#[derive(Debug, Default)]
pub struct NetworkEndpointRule;

impl NetworkEndpointRule {
    fn routes_to(service: &ServiceSpec, pod: &Resource) -> bool {
        let ResourceSpec::Pod(pod_spec) = &pod.spec else {
            return false;
        };
        // Container ports are informational; a pod that lists none may still
        // listen on anything.
        if pod_spec.ports.is_empty() {
            return true;
        }
        let declared: Vec<_> = service.ports.iter().filter(|p| p.port.is_some()).collect();
        if declared.is_empty() {
            return true;
        }

        declared.iter().any(|sp| {
            let target = sp
                .target_port
                .clone()
                .or(sp.port.map(TargetPort::Number));
            pod_spec.ports.iter().any(|cp| {
                let protocol_ok = cp.protocol.eq_ignore_ascii_case(&sp.protocol);
                let port_ok = match &target {
                    Some(TargetPort::Number(n)) => cp.port == *n,
                    Some(TargetPort::Name(name)) => cp.name.as_deref() == Some(name.as_str()),
                    None => false,
                };
                protocol_ok && port_ok
            })
        })
    }
}

impl RelationshipRule for NetworkEndpointRule {
    fn name(&self) -> &'static str {
        "network-endpoint"
    }

    fn relation(&self) -> Relation {
        Relation::NetworkEndpoint
    }

    fn infer(&self, resource: &Resource, catalog: &ResourceCatalog) -> RuleOutput {
        let mut out = RuleOutput::default();
        let id = resource.id();

        match &resource.spec {
            ResourceSpec::Service(service) => {
                for (i, port) in service.ports.iter().enumerate() {
                    if port.port.is_none() {
                        out.diagnose(self.name(), &id, format!("service port #{} has no port number", i));
                    }
                }
                let (Some(selector), Some(ns)) = (service.selector.as_ref(), resource.namespace()) else {
                    return out;
                };
                for pod in catalog.in_namespace(ns, ResourceKind::Pod) {
                    if selector.matches(pod.labels()) && Self::routes_to(service, pod) {
                        out.selected(
                            Edge::new(id.clone(), pod.id(), Relation::NetworkEndpoint)
                                .with_label("routes to"),
                        );
                    }
                }
            }
            ResourceSpec::Ingress(ingress) => {
                if ingress.backends.is_empty() {
                    out.diagnose(self.name(), &id, "ingress declares no service backend");
                }
                for backend in &ingress.backends {
                    out.reference(
                        Edge::new(
                            id.clone(),
                            NodeId::new(ResourceKind::Service, resource.namespace(), backend),
                            Relation::NetworkEndpoint,
                        )
                        .with_label("routes to"),
                    );
                }
            }
            _ => {}
        }

        out
    }

    fn selector_kinds(&self, target: ResourceKind) -> &'static [ResourceKind] {
        if target == ResourceKind::Pod {
            &[ResourceKind::Service]
        } else {
            &[]
        }
    }

    fn infer_pair(&self, holder: &Resource, target: &Resource) -> Option<Edge> {
        let ResourceSpec::Service(service) = &holder.spec else {
            return None;
        };
        if target.kind != ResourceKind::Pod || holder.namespace() != target.namespace() {
            return None;
        }
        let selector = service.selector.as_ref()?;
        (selector.matches(target.labels()) && Self::routes_to(service, target)).then(|| {
            Edge::new(holder.id(), target.id(), Relation::NetworkEndpoint).with_label("routes to")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn pod(name: &str, ports: serde_json::Value) -> Arc<Resource> {
        Arc::new(
            Resource::from_json(
                ResourceKind::Pod,
                &json!({
                    "metadata": {"name": name, "namespace": "ns", "labels": {"app": "web"}},
                    "spec": {"containers": [{"name": "c", "ports": ports}]}
                }),
            )
            .unwrap(),
        )
    }

    fn service(ports: serde_json::Value) -> Resource {
        Resource::from_json(
            ResourceKind::Service,
            &json!({
                "metadata": {"name": "web", "namespace": "ns"},
                "spec": {"selector": {"app": "web"}, "ports": ports}
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_port_compatibility() {
        let http = pod("http", json!([{"name": "http", "containerPort": 8080}]));
        let dns = pod("dns", json!([{"containerPort": 53, "protocol": "UDP"}]));
        let bare = pod("bare", json!([]));

        let by_name = service(json!([{"port": 80, "targetPort": "http"}]));
        assert!(NetworkEndpointRule.infer_pair(&by_name, &http).is_some());
        assert!(NetworkEndpointRule.infer_pair(&by_name, &dns).is_none());
        assert!(NetworkEndpointRule.infer_pair(&by_name, &bare).is_some());

        let by_number = service(json!([{"port": 53}]));
        // TCP service port does not reach a UDP-only container.
        assert!(NetworkEndpointRule.infer_pair(&by_number, &dns).is_none());
        let udp = service(json!([{"port": 53, "protocol": "UDP"}]));
        assert!(NetworkEndpointRule.infer_pair(&udp, &dns).is_some());
    }

    #[test]
    fn test_ingress_backends() {
        let ingress = Resource::from_json(
            ResourceKind::Ingress,
            &json!({
                "metadata": {"name": "edge", "namespace": "ns"},
                "spec": {"rules": [{"http": {"paths": [
                    {"path": "/", "backend": {"service": {"name": "web", "port": {"number": 80}}}},
                    {"path": "/api", "backend": {"service": {"name": "api", "port": {"number": 80}}}}
                ]}}]}
            }),
        )
        .unwrap();

        let out = NetworkEndpointRule.infer(&ingress, &ResourceCatalog::new());
        let targets: Vec<_> = out.edges.iter().map(|e| e.edge.target.as_str()).collect();
        assert_eq!(targets, vec!["service/ns/web", "service/ns/api"]);
    }
}
