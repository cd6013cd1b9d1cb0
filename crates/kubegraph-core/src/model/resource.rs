//! Typed view of raw cluster objects.
//!
//! Raw objects arrive as arbitrary JSON. At ingestion time each object is
//! reduced to shared metadata plus a [`ResourceSpec`] variant holding only the
//! fields relationship inference needs. Everything else is kept opaquely in
//! the attribute bag that ends up on the graph node.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::error::ResourceError;
use super::graph::{HealthStatus, Node, NodeId};
use super::kind::ResourceKind;
use super::selector::{string_map, LabelSelector};

/// Namespace assumed for namespaced objects that do not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Annotations that are never copied into node attributes.
const SKIPPED_ANNOTATIONS: &[&str] = &["kubectl.kubernetes.io/last-applied-configuration"];

/// Top-level fields that are interpreted rather than carried opaquely.
const KNOWN_TOP_LEVEL: &[&str] = &["apiVersion", "kind", "metadata", "spec", "status", "data", "stringData"];

/// A controller or owner reference from `metadata.ownerReferences`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    /// Raw kind string; may name a kind the engine does not model.
    pub kind: String,
    pub name: String,
    pub uid: Option<String>,
    pub controller: bool,
}

/// Identity and labelling shared by every kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: Option<String>,
    pub uid: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner_references: Vec<OwnerReference>,
    pub deleting: bool,
}

/// Where a pod volume gets its content from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeSource {
    ConfigMap(String),
    Secret(String),
    Claim(String),
}

/// A named pod volume backed by a cluster object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodVolume {
    pub name: String,
    pub source: VolumeSource,
}

/// Config object a container reads environment variables from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvReference {
    ConfigMap(String),
    Secret(String),
}

/// A port exposed by a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPort {
    pub name: Option<String>,
    pub port: i64,
    pub protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpec {
    pub volumes: Vec<PodVolume>,
    pub env_refs: Vec<EnvReference>,
    pub image_pull_secrets: Vec<String>,
    pub service_account: Option<String>,
    pub ports: Vec<ContainerPort>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub selector: Option<LabelSelector>,
    /// Selector terms that could not be understood and were left out.
    pub selector_problems: Vec<String>,
}

/// `spec.podSelector` of a network policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySpec {
    pub pod_selector: Option<LabelSelector>,
    pub selector_problems: Vec<String>,
}

/// `targetPort` of a service port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetPort {
    Number(i64),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub name: Option<String>,
    /// `None` when the object omits the mandatory `port` field.
    pub port: Option<i64>,
    pub target_port: Option<TargetPort>,
    pub protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub selector: Option<LabelSelector>,
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressSpec {
    pub backends: Vec<String>,
    pub tls_secrets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSpec {
    pub volume_name: Option<String>,
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub storage_class: Option<String>,
}

/// `roleRef` of a binding; kind kept raw so bad references can be diagnosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSpec {
    pub role_ref: Option<RoleRef>,
    pub subjects: Vec<Subject>,
}

/// Kind-specific fields extracted at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceSpec {
    /// Kinds whose relationships come from metadata alone.
    Plain,
    Pod(PodSpec),
    Workload(WorkloadSpec),
    Service(ServiceSpec),
    Policy(PolicySpec),
    Ingress(IngressSpec),
    Claim(ClaimSpec),
    Volume(VolumeSpec),
    Binding(BindingSpec),
}

/// A parsed cluster object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub meta: ObjectMeta,
    pub spec: ResourceSpec,
    pub status: HealthStatus,
    pub attributes: BTreeMap<String, Value>,
}

impl Resource {
    /// Build a resource from a raw Kubernetes-shaped object.
    pub fn from_json(kind: ResourceKind, object: &Value) -> Result<Self, ResourceError> {
        let obj = object
            .as_object()
            .ok_or(ResourceError::NotAnObject { kind })?;

        if let Some(declared) = obj.get("kind").and_then(|k| k.as_str()) {
            if declared.parse::<ResourceKind>().ok() != Some(kind) {
                return Err(ResourceError::KindMismatch {
                    expected: kind,
                    declared: declared.to_string(),
                });
            }
        }

        let meta = parse_meta(kind, object)?;
        let spec_value = object.get("spec").unwrap_or(&Value::Null);
        let status_value = object.get("status").unwrap_or(&Value::Null);

        let spec = match kind {
            ResourceKind::Pod => ResourceSpec::Pod(parse_pod(spec_value)),
            k if k.is_workload() => {
                let (selector, selector_problems) = parse_selector(spec_value.get("selector"));
                ResourceSpec::Workload(WorkloadSpec {
                    selector,
                    selector_problems,
                })
            }
            ResourceKind::Service => ResourceSpec::Service(parse_service(spec_value)),
            ResourceKind::NetworkPolicy => {
                let (pod_selector, selector_problems) = parse_selector(spec_value.get("podSelector"));
                ResourceSpec::Policy(PolicySpec {
                    pod_selector,
                    selector_problems,
                })
            }
            ResourceKind::Ingress => ResourceSpec::Ingress(parse_ingress(spec_value)),
            ResourceKind::PersistentVolumeClaim => ResourceSpec::Claim(ClaimSpec {
                volume_name: str_at(spec_value, "volumeName"),
                storage_class: str_at(spec_value, "storageClassName"),
            }),
            ResourceKind::PersistentVolume => ResourceSpec::Volume(VolumeSpec {
                storage_class: str_at(spec_value, "storageClassName"),
            }),
            ResourceKind::RoleBinding | ResourceKind::ClusterRoleBinding => {
                ResourceSpec::Binding(parse_binding(object))
            }
            _ => ResourceSpec::Plain,
        };

        let status = if meta.deleting {
            HealthStatus::Terminating
        } else {
            derive_status(kind, spec_value, status_value)
        };

        let attributes = collect_attributes(kind, obj, &meta, spec_value, status_value);

        Ok(Self {
            kind,
            meta,
            spec,
            status,
            attributes,
        })
    }

    pub fn id(&self) -> NodeId {
        NodeId::new(self.kind, self.namespace(), &self.meta.name)
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Namespace, or `None` for cluster-scoped kinds.
    pub fn namespace(&self) -> Option<&str> {
        self.meta.namespace.as_deref()
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.meta.labels
    }

    /// Label selector declared by this resource, if any.
    pub fn selector(&self) -> Option<&LabelSelector> {
        match &self.spec {
            ResourceSpec::Workload(w) => w.selector.as_ref(),
            ResourceSpec::Service(s) => s.selector.as_ref(),
            ResourceSpec::Policy(p) => p.pod_selector.as_ref(),
            _ => None,
        }
    }

    /// Node record for this resource at the given revision.
    pub fn to_node(&self, revision: u64) -> Node {
        Node {
            id: self.id(),
            kind: self.kind,
            name: self.meta.name.clone(),
            namespace: self.meta.namespace.clone(),
            uid: self.meta.uid.clone(),
            status: self.status,
            revision,
            attributes: self.attributes.clone(),
        }
    }
}

fn parse_meta(kind: ResourceKind, object: &Value) -> Result<ObjectMeta, ResourceError> {
    let metadata = object
        .get("metadata")
        .ok_or(ResourceError::MissingField {
            kind,
            field: "metadata",
        })?;
    let name = metadata
        .get("name")
        .and_then(|n| n.as_str())
        .filter(|n| !n.is_empty())
        .ok_or(ResourceError::MissingField {
            kind,
            field: "metadata.name",
        })?
        .to_string();

    let namespace = if kind.is_cluster_scoped() {
        None
    } else {
        Some(
            str_at(metadata, "namespace")
                .filter(|ns| !ns.is_empty())
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        )
    };

    let owner_references = metadata
        .get("ownerReferences")
        .and_then(|v| v.as_array())
        .map(|refs| {
            refs.iter()
                .filter_map(|r| {
                    Some(OwnerReference {
                        kind: r.get("kind")?.as_str()?.to_string(),
                        name: r.get("name")?.as_str()?.to_string(),
                        uid: str_at(r, "uid"),
                        controller: r.get("controller").and_then(|c| c.as_bool()).unwrap_or(false),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut annotations = string_map(metadata.get("annotations"));
    for skipped in SKIPPED_ANNOTATIONS {
        annotations.remove(*skipped);
    }

    Ok(ObjectMeta {
        name,
        namespace,
        uid: str_at(metadata, "uid"),
        labels: string_map(metadata.get("labels")),
        annotations,
        owner_references,
        deleting: metadata
            .get("deletionTimestamp")
            .map_or(false, |v| !v.is_null()),
    })
}

fn parse_pod(spec: &Value) -> PodSpec {
    let mut pod = PodSpec::default();

    for volume in array_at(spec, "volumes") {
        let name = str_at(volume, "name").unwrap_or_default();
        if let Some(cm) = volume.get("configMap").and_then(|v| str_at(v, "name")) {
            pod.volumes.push(PodVolume {
                name: name.clone(),
                source: VolumeSource::ConfigMap(cm),
            });
        }
        if let Some(secret) = volume.get("secret").and_then(|v| str_at(v, "secretName")) {
            pod.volumes.push(PodVolume {
                name: name.clone(),
                source: VolumeSource::Secret(secret),
            });
        }
        if let Some(claim) = volume
            .get("persistentVolumeClaim")
            .and_then(|v| str_at(v, "claimName"))
        {
            pod.volumes.push(PodVolume {
                name: name.clone(),
                source: VolumeSource::Claim(claim),
            });
        }
        if let Some(projected) = volume.get("projected") {
            for source in array_at(projected, "sources") {
                if let Some(cm) = source.get("configMap").and_then(|v| str_at(v, "name")) {
                    pod.volumes.push(PodVolume {
                        name: name.clone(),
                        source: VolumeSource::ConfigMap(cm),
                    });
                }
                if let Some(secret) = source.get("secret").and_then(|v| str_at(v, "name")) {
                    pod.volumes.push(PodVolume {
                        name: name.clone(),
                        source: VolumeSource::Secret(secret),
                    });
                }
            }
        }
    }

    let containers = array_at(spec, "containers")
        .iter()
        .chain(array_at(spec, "initContainers").iter());
    for container in containers {
        for env in array_at(container, "env") {
            if let Some(from) = env.get("valueFrom") {
                if let Some(cm) = from.get("configMapKeyRef").and_then(|v| str_at(v, "name")) {
                    pod.env_refs.push(EnvReference::ConfigMap(cm));
                }
                if let Some(secret) = from.get("secretKeyRef").and_then(|v| str_at(v, "name")) {
                    pod.env_refs.push(EnvReference::Secret(secret));
                }
            }
        }
        for env_from in array_at(container, "envFrom") {
            if let Some(cm) = env_from.get("configMapRef").and_then(|v| str_at(v, "name")) {
                pod.env_refs.push(EnvReference::ConfigMap(cm));
            }
            if let Some(secret) = env_from.get("secretRef").and_then(|v| str_at(v, "name")) {
                pod.env_refs.push(EnvReference::Secret(secret));
            }
        }
        for port in array_at(container, "ports") {
            if let Some(number) = port.get("containerPort").and_then(|p| p.as_i64()) {
                pod.ports.push(ContainerPort {
                    name: str_at(port, "name"),
                    port: number,
                    protocol: str_at(port, "protocol").unwrap_or_else(|| "TCP".to_string()),
                });
            }
        }
    }
    pod.env_refs.dedup();

    pod.image_pull_secrets = array_at(spec, "imagePullSecrets")
        .iter()
        .filter_map(|s| str_at(s, "name"))
        .collect();
    pod.service_account =
        str_at(spec, "serviceAccountName").or_else(|| str_at(spec, "serviceAccount"));

    pod
}

fn parse_service(spec: &Value) -> ServiceSpec {
    let selector = spec
        .get("selector")
        .map(|s| LabelSelector::from_labels(string_map(Some(s))))
        .filter(|s| !s.is_empty());

    let ports = array_at(spec, "ports")
        .iter()
        .map(|p| ServicePort {
            name: str_at(p, "name"),
            port: p.get("port").and_then(|v| v.as_i64()),
            target_port: match p.get("targetPort") {
                Some(Value::Number(n)) => n.as_i64().map(TargetPort::Number),
                Some(Value::String(s)) => Some(match s.parse::<i64>() {
                    Ok(n) => TargetPort::Number(n),
                    Err(_) => TargetPort::Name(s.clone()),
                }),
                _ => None,
            },
            protocol: str_at(p, "protocol").unwrap_or_else(|| "TCP".to_string()),
        })
        .collect();

    ServiceSpec { selector, ports }
}

fn parse_ingress(spec: &Value) -> IngressSpec {
    let mut backends = Vec::new();
    let mut push_backend = |backend: &Value| {
        let name = backend
            .get("service")
            .and_then(|s| str_at(s, "name"))
            .or_else(|| str_at(backend, "serviceName"));
        if let Some(name) = name {
            if !backends.contains(&name) {
                backends.push(name);
            }
        }
    };

    for key in ["defaultBackend", "backend"] {
        if let Some(backend) = spec.get(key) {
            push_backend(backend);
        }
    }
    for rule in array_at(spec, "rules") {
        if let Some(http) = rule.get("http") {
            for path in array_at(http, "paths") {
                if let Some(backend) = path.get("backend") {
                    push_backend(backend);
                }
            }
        }
    }

    let tls_secrets = array_at(spec, "tls")
        .iter()
        .filter_map(|t| str_at(t, "secretName"))
        .collect();

    IngressSpec {
        backends,
        tls_secrets,
    }
}

fn parse_binding(object: &Value) -> BindingSpec {
    let role_ref = object.get("roleRef").and_then(|r| {
        Some(RoleRef {
            kind: str_at(r, "kind")?,
            name: str_at(r, "name")?,
        })
    });
    let subjects = array_at(object, "subjects")
        .iter()
        .filter_map(|s| {
            Some(Subject {
                kind: str_at(s, "kind")?,
                name: str_at(s, "name")?,
                namespace: str_at(s, "namespace"),
            })
        })
        .collect();
    BindingSpec { role_ref, subjects }
}

fn derive_status(kind: ResourceKind, spec: &Value, status: &Value) -> HealthStatus {
    match kind {
        ResourceKind::Pod => pod_status(status),
        ResourceKind::Deployment | ResourceKind::ReplicaSet | ResourceKind::StatefulSet => {
            let desired = spec.get("replicas").and_then(|v| v.as_i64()).unwrap_or(1);
            let ready = int_at(status, "readyReplicas");
            replica_status(desired, ready)
        }
        ResourceKind::DaemonSet => {
            replica_status(int_at(status, "desiredNumberScheduled"), int_at(status, "numberReady"))
        }
        ResourceKind::Job => {
            if int_at(status, "succeeded") > 0 {
                HealthStatus::Healthy
            } else if int_at(status, "failed") > 0 && int_at(status, "active") == 0 {
                HealthStatus::Failed
            } else if int_at(status, "active") > 0 {
                HealthStatus::Healthy
            } else {
                HealthStatus::Pending
            }
        }
        ResourceKind::CronJob => {
            if spec.get("suspend").and_then(|s| s.as_bool()).unwrap_or(false) {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            }
        }
        ResourceKind::PersistentVolumeClaim => match str_at(status, "phase").as_deref() {
            Some("Bound") => HealthStatus::Healthy,
            Some("Pending") => HealthStatus::Pending,
            Some("Lost") => HealthStatus::Failed,
            _ => HealthStatus::Unknown,
        },
        ResourceKind::PersistentVolume => match str_at(status, "phase").as_deref() {
            Some("Bound") | Some("Available") => HealthStatus::Healthy,
            Some("Released") => HealthStatus::Degraded,
            Some("Failed") => HealthStatus::Failed,
            Some("Pending") => HealthStatus::Pending,
            _ => HealthStatus::Unknown,
        },
        ResourceKind::Namespace => match str_at(status, "phase").as_deref() {
            Some("Terminating") => HealthStatus::Terminating,
            _ => HealthStatus::Healthy,
        },
        _ => HealthStatus::Healthy,
    }
}

fn pod_status(status: &Value) -> HealthStatus {
    let container_statuses = array_at(status, "containerStatuses");
    let crash_looping = container_statuses.iter().any(|cs| {
        cs.get("state")
            .and_then(|s| s.get("waiting"))
            .and_then(|w| str_at(w, "reason"))
            .map_or(false, |r| r == "CrashLoopBackOff" || r == "ImagePullBackOff")
    });
    if crash_looping {
        return HealthStatus::Failed;
    }

    match str_at(status, "phase").as_deref() {
        Some("Running") => {
            let all_ready = container_statuses
                .iter()
                .all(|cs| cs.get("ready").and_then(|r| r.as_bool()).unwrap_or(false));
            if all_ready {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            }
        }
        Some("Succeeded") => HealthStatus::Healthy,
        Some("Pending") => HealthStatus::Pending,
        Some("Failed") => HealthStatus::Failed,
        _ => HealthStatus::Unknown,
    }
}

fn replica_status(desired: i64, ready: i64) -> HealthStatus {
    if desired == 0 || ready >= desired {
        HealthStatus::Healthy
    } else if ready > 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Pending
    }
}

fn collect_attributes(
    kind: ResourceKind,
    obj: &serde_json::Map<String, Value>,
    meta: &ObjectMeta,
    spec: &Value,
    status: &Value,
) -> BTreeMap<String, Value> {
    let mut attrs = BTreeMap::new();

    if !meta.labels.is_empty() {
        attrs.insert("labels".to_string(), serde_json::json!(meta.labels));
    }
    if !meta.annotations.is_empty() {
        attrs.insert("annotations".to_string(), serde_json::json!(meta.annotations));
    }
    if let Some(api_version) = obj.get("apiVersion") {
        attrs.insert("apiVersion".to_string(), api_version.clone());
    }
    if let Some(created) = obj
        .get("metadata")
        .and_then(|m| m.get("creationTimestamp"))
        .filter(|v| !v.is_null())
    {
        attrs.insert("createdAt".to_string(), created.clone());
    }

    // (attribute, read from status?, field)
    let highlights: Vec<(&str, bool, &str)> = match kind {
        ResourceKind::Pod => vec![
            ("nodeName", false, "nodeName"),
            ("phase", true, "phase"),
            ("podIP", true, "podIP"),
        ],
        ResourceKind::Deployment | ResourceKind::ReplicaSet | ResourceKind::StatefulSet => vec![
            ("replicas", false, "replicas"),
            ("readyReplicas", true, "readyReplicas"),
        ],
        ResourceKind::DaemonSet => vec![
            ("desiredNumberScheduled", true, "desiredNumberScheduled"),
            ("numberReady", true, "numberReady"),
        ],
        ResourceKind::CronJob => vec![("schedule", false, "schedule"), ("suspend", false, "suspend")],
        ResourceKind::Service => vec![("type", false, "type"), ("clusterIP", false, "clusterIP")],
        ResourceKind::NetworkPolicy => vec![("policyTypes", false, "policyTypes")],
        ResourceKind::PersistentVolumeClaim | ResourceKind::PersistentVolume => vec![
            ("phase", true, "phase"),
            ("accessModes", false, "accessModes"),
        ],
        _ => Vec::new(),
    };
    for (attr, from_status, field) in highlights {
        let source = if from_status { status } else { spec };
        if let Some(v) = source.get(field).filter(|v| !v.is_null()) {
            attrs.insert(attr.to_string(), v.clone());
        }
    }
    if kind == ResourceKind::Pod {
        let images: Vec<Value> = array_at(spec, "containers")
            .iter()
            .filter_map(|c| c.get("image").cloned())
            .collect();
        if !images.is_empty() {
            attrs.insert("images".to_string(), Value::Array(images));
        }
    }

    for (key, value) in obj {
        if !KNOWN_TOP_LEVEL.contains(&key.as_str()) {
            attrs.insert(key.clone(), value.clone());
        }
    }

    attrs
}

/// A `{matchLabels, matchExpressions}` selector with its unreadable terms.
fn parse_selector(raw: Option<&Value>) -> (Option<LabelSelector>, Vec<String>) {
    match raw {
        Some(raw) if !raw.is_null() => {
            let (selector, problems) = LabelSelector::from_json(raw);
            (Some(selector), problems)
        }
        _ => (None, Vec::new()),
    }
}

fn str_at(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn int_at(value: &Value, key: &str) -> i64 {
    value.get(key).and_then(|v| v.as_i64()).unwrap_or(0)
}

fn array_at<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
