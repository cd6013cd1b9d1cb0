use crate::model::{
    Edge, EnvReference, NodeId, Relation, Resource, ResourceKind, ResourceSpec, VolumeSource,
};

use super::{RelationshipRule, ResourceCatalog, RuleOutput};

/// Named references to storage and configuration objects.
///
/// Covers pod volumes, env references and image pull secrets, plus
/// claim -> volume and claim/volume -> storage class bindings.
#[derive(Debug, Default)]
pub struct VolumeReferenceRule;

impl VolumeReferenceRule {
    fn edge(from: &NodeId, to: NodeId, label: &str) -> Edge {
        Edge::new(from.clone(), to, Relation::VolumeReference).with_label(label)
    }
}

impl RelationshipRule for VolumeReferenceRule {
    fn name(&self) -> &'static str {
        "volume-reference"
    }

    fn relation(&self) -> Relation {
        Relation::VolumeReference
    }

    fn infer(&self, resource: &Resource, _catalog: &ResourceCatalog) -> RuleOutput {
        let mut out = RuleOutput::default();
        let id = resource.id();
        let ns = resource.namespace();

        match &resource.spec {
            ResourceSpec::Pod(pod) => {
                for volume in &pod.volumes {
                    let (kind, name, label) = match &volume.source {
                        VolumeSource::ConfigMap(name) => (ResourceKind::ConfigMap, name, "mounts"),
                        VolumeSource::Secret(name) => (ResourceKind::Secret, name, "mounts"),
                        VolumeSource::Claim(name) => {
                            (ResourceKind::PersistentVolumeClaim, name, "mounts")
                        }
                    };
                    if name.is_empty() {
                        out.diagnose(
                            self.name(),
                            &id,
                            format!("volume {} names no {}", volume.name, kind),
                        );
                        continue;
                    }
                    out.reference(Self::edge(&id, NodeId::new(kind, ns, name), label));
                }
                for env in &pod.env_refs {
                    let target = match env {
                        EnvReference::ConfigMap(name) => NodeId::new(ResourceKind::ConfigMap, ns, name),
                        EnvReference::Secret(name) => NodeId::new(ResourceKind::Secret, ns, name),
                    };
                    out.reference(Self::edge(&id, target, "reads env from"));
                }
                for secret in &pod.image_pull_secrets {
                    out.reference(Self::edge(
                        &id,
                        NodeId::new(ResourceKind::Secret, ns, secret),
                        "pulls images with",
                    ));
                }
            }
            ResourceSpec::Claim(claim) => {
                if let Some(volume) = claim.volume_name.as_deref().filter(|v| !v.is_empty()) {
                    out.reference(Self::edge(
                        &id,
                        NodeId::new(ResourceKind::PersistentVolume, None, volume),
                        "claims",
                    ));
                }
                if let Some(class) = claim.storage_class.as_deref().filter(|c| !c.is_empty()) {
                    out.reference(Self::edge(
                        &id,
                        NodeId::new(ResourceKind::StorageClass, None, class),
                        "uses class",
                    ));
                }
            }
            ResourceSpec::Volume(volume) => {
                if let Some(class) = volume.storage_class.as_deref().filter(|c| !c.is_empty()) {
                    out.reference(Self::edge(
                        &id,
                        NodeId::new(ResourceKind::StorageClass, None, class),
                        "uses class",
                    ));
                }
            }
            ResourceSpec::Ingress(ingress) => {
                for secret in &ingress.tls_secrets {
                    out.reference(Self::edge(
                        &id,
                        NodeId::new(ResourceKind::Secret, ns, secret),
                        "terminates tls with",
                    ));
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
    fn test_pod_references() {
        let pod = Resource::from_json(
            ResourceKind::Pod,
            &json!({
                "metadata": {"name": "p", "namespace": "ns"},
                "spec": {
                    "volumes": [
                        {"name": "cfg", "configMap": {"name": "app-config"}},
                        {"name": "data", "persistentVolumeClaim": {"claimName": "data"}}
                    ],
                    "imagePullSecrets": [{"name": "registry"}],
                    "containers": [{
                        "name": "c",
                        "env": [{"name": "PW", "valueFrom": {"secretKeyRef": {"name": "db", "key": "pw"}}}]
                    }]
                }
            }),
        )
        .unwrap();

        let out = VolumeReferenceRule.infer(&pod, &ResourceCatalog::new());
        let targets: Vec<_> = out.edges.iter().map(|e| e.edge.target.as_str()).collect();
        assert_eq!(
            targets,
            vec![
                "configmap/ns/app-config",
                "persistentvolumeclaim/ns/data",
                "secret/ns/db",
                "secret/ns/registry"
            ]
        );
    }

    #[test]
    fn test_claim_binds_cluster_scoped_volume() {
        let claim = Resource::from_json(
            ResourceKind::PersistentVolumeClaim,
            &json!({
                "metadata": {"name": "data", "namespace": "ns"},
                "spec": {"volumeName": "pv-1", "storageClassName": "fast"}
            }),
        )
        .unwrap();

        let out = VolumeReferenceRule.infer(&claim, &ResourceCatalog::new());
        let targets: Vec<_> = out.edges.iter().map(|e| e.edge.target.as_str()).collect();
        assert_eq!(targets, vec!["persistentvolume/pv-1", "storageclass/fast"]);
    }
}
