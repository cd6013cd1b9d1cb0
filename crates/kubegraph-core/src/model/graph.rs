//! Node and edge records held by the graph store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::kind::ResourceKind;

/// Stable node identifier: `kind/namespace/name`, or `kind/name` for
/// cluster-scoped kinds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Build the id for a resource. Namespaces are ignored for cluster-scoped kinds.
    pub fn new(kind: ResourceKind, namespace: Option<&str>, name: &str) -> Self {
        match namespace {
            Some(ns) if !kind.is_cluster_scoped() => Self(format!("{}/{}/{}", kind, ns, name)),
            _ => Self(format!("{}/{}", kind, name)),
        }
    }

    /// Id of the namespace node with the given name.
    pub fn namespace(name: &str) -> Self {
        Self::new(ResourceKind::Namespace, None, name)
    }

    /// Wrap an id string received from a caller.
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Kind encoded in the id prefix.
    pub fn kind(&self) -> Option<ResourceKind> {
        self.0.split('/').next().and_then(|k| k.parse().ok())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic edge identifier derived from (source, target, relation).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    pub fn derive(source: &NodeId, target: &NodeId, relation: Relation) -> Self {
        Self(format!("{}->{}:{}", source, target, relation))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Semantic type of an edge. Part of edge identity, so two relations between
/// the same pair of nodes are kept as two edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relation {
    Ownership,
    SelectorMatch,
    VolumeReference,
    NetworkEndpoint,
    IdentityBinding,
    NamespaceContainment,
}

impl Relation {
    pub const ALL: [Relation; 6] = [
        Self::Ownership,
        Self::SelectorMatch,
        Self::VolumeReference,
        Self::NetworkEndpoint,
        Self::IdentityBinding,
        Self::NamespaceContainment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ownership => "ownership",
            Self::SelectorMatch => "selector-match",
            Self::VolumeReference => "volume-reference",
            Self::NetworkEndpoint => "network-endpoint",
            Self::IdentityBinding => "identity-binding",
            Self::NamespaceContainment => "namespace-containment",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summarized health of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Failed,
    Pending,
    Terminating,
    #[default]
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
            Self::Pending => "pending",
            Self::Terminating => "terminating",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cluster resource instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: ResourceKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Server-assigned UID, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub status: HealthStatus,
    /// Bumped on every observed update.
    pub revision: u64,
    /// Kind-specific metadata, never interpreted by the engine.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Node {
    /// True when everything but the revision counter is equal.
    pub fn same_content(&self, other: &Node) -> bool {
        self.id == other.id
            && self.kind == other.kind
            && self.name == other.name
            && self.namespace == other.namespace
            && self.uid == other.uid
            && self.status == other.status
            && self.attributes == other.attributes
    }
}

/// A directed, typed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub relation: Relation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId, relation: Relation) -> Self {
        Self {
            id: EdgeId::derive(&source, &target, relation),
            source,
            target,
            relation,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The other endpoint, when `node` is one of the two.
    pub fn opposite(&self, node: &NodeId) -> Option<&NodeId> {
        if &self.source == node {
            Some(&self.target)
        } else if &self.target == node {
            Some(&self.source)
        } else {
            None
        }
    }
}
