//! Resource and graph data model.

mod error;
mod graph;
mod kind;
mod resource;
mod selector;

pub use error::ResourceError;
pub use graph::{Edge, EdgeId, HealthStatus, Node, NodeId, Relation};
pub use kind::{ResourceKind, UnknownKind};
pub use resource::{
    BindingSpec, ClaimSpec, ContainerPort, EnvReference, IngressSpec, ObjectMeta, OwnerReference,
    PodSpec, PodVolume, PolicySpec, Resource, ResourceSpec, RoleRef, ServicePort, ServiceSpec, Subject,
    TargetPort, VolumeSource, VolumeSpec, WorkloadSpec, DEFAULT_NAMESPACE,
};
pub use selector::{LabelSelector, SelectorOperator, SelectorRequirement};
