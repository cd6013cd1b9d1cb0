//! Relationship inference rules.
//!
//! Each rule is a pure function from a declaring resource (plus a read-only
//! [`ResourceCatalog`] of everything known so far) to a set of typed edges.
//! Rules never fail: input they cannot interpret produces a [`Diagnostic`]
//! and no edge.
//!
//! Every inferred edge has exactly one declaring resource, which is always
//! one of its two endpoints. The builder uses that to diff edge sets when a
//! resource changes.

mod catalog;
mod identity;
mod namespace;
mod network;
mod ownership;
mod registry;
mod selector;
mod volume;

pub use catalog::ResourceCatalog;
pub use identity::IdentityBindingRule;
pub use namespace::NamespaceContainmentRule;
pub use network::NetworkEndpointRule;
pub use ownership::OwnershipRule;
pub use registry::RuleRegistry;
pub use selector::SelectorMatchRule;
pub use volume::VolumeReferenceRule;

use serde::{Deserialize, Serialize};

use crate::model::{Edge, NodeId, Relation, Resource, ResourceKind};

/// How an edge was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeOrigin {
    /// Derived from a name the declarer spells out (owner, volume, role...).
    /// Waits as a pending edge while the named object is missing.
    Reference,
    /// Derived by matching labels against objects that already exist.
    Selector,
}

/// An edge together with its derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredEdge {
    pub edge: Edge,
    pub origin: EdgeOrigin,
}

/// A rule could not interpret part of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub rule: String,
    pub resource: NodeId,
    pub message: String,
}

/// Result of evaluating one or more rules.
#[derive(Debug, Clone, Default)]
pub struct RuleOutput {
    pub edges: Vec<InferredEdge>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RuleOutput {
    pub fn reference(&mut self, edge: Edge) {
        self.edges.push(InferredEdge {
            edge,
            origin: EdgeOrigin::Reference,
        });
    }

    pub fn selected(&mut self, edge: Edge) {
        self.edges.push(InferredEdge {
            edge,
            origin: EdgeOrigin::Selector,
        });
    }

    pub fn diagnose(&mut self, rule: &str, resource: &NodeId, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            rule: rule.to_string(),
            resource: resource.clone(),
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: RuleOutput) {
        self.edges.extend(other.edges);
        self.diagnostics.extend(other.diagnostics);
    }
}

/// A family of relationships between resources.
pub trait RelationshipRule: Send + Sync {
    /// Short name used in diagnostics and logs.
    fn name(&self) -> &'static str;

    /// Relation type of every edge this rule produces.
    fn relation(&self) -> Relation;

    /// Edges declared by `resource`.
    fn infer(&self, resource: &Resource, catalog: &ResourceCatalog) -> RuleOutput;

    /// Kinds whose label selectors may pick up a resource of kind `target`.
    ///
    /// When such a resource is added or its labels change, the builder
    /// re-evaluates [`RelationshipRule::infer_pair`] for every holder of
    /// these kinds in the same namespace.
    fn selector_kinds(&self, _target: ResourceKind) -> &'static [ResourceKind] {
        &[]
    }

    /// Edge from `holder` to `target`, if `holder`'s selector picks `target`.
    fn infer_pair(&self, _holder: &Resource, _target: &Resource) -> Option<Edge> {
        None
    }
}
