//! Graph invariant checks.
//!
//! Validation never fails and never mutates anything; violations downgrade
//! the served graph to [`Completeness::Degraded`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use crate::model::{Edge, EdgeId, Node, NodeId};
use crate::store::GraphSnapshot;

/// Stable violation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    DanglingEdge,
    OrphanNode,
    DuplicateNode,
    DuplicateEdge,
    EdgeIdMismatch,
    /// The view was truncated to the configured node cap.
    NodeLimit,
}

impl ViolationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DanglingEdge => "DANGLING_EDGE",
            Self::OrphanNode => "ORPHAN_NODE",
            Self::DuplicateNode => "DUPLICATE_NODE",
            Self::DuplicateEdge => "DUPLICATE_EDGE",
            Self::EdgeIdMismatch => "EDGE_ID_MISMATCH",
            Self::NodeLimit => "NODE_LIMIT",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub code: ViolationCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<EdgeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Complete,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub completeness: Completeness,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn from_violations(mut violations: Vec<Violation>) -> Self {
        violations.sort_by(|a, b| {
            (a.code, &a.node, &a.edge, &a.message).cmp(&(b.code, &b.node, &b.edge, &b.message))
        });
        let completeness = if violations.is_empty() {
            Completeness::Complete
        } else {
            Completeness::Degraded
        };
        Self {
            completeness,
            violations,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completeness == Completeness::Complete
    }

    pub fn count(&self, code: ViolationCode) -> usize {
        self.violations.iter().filter(|v| v.code == code).count()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
        let violations = std::mem::take(&mut self.violations);
        *self = Self::from_violations(violations);
    }
}

/// Checks a set of node and edge records.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    /// Nodes that may have no incident edge besides the kind exemptions.
    exempt: BTreeSet<NodeId>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exempt specific nodes from the orphan check (e.g. an ego-network focus).
    pub fn exempting(mut self, ids: impl IntoIterator<Item = NodeId>) -> Self {
        self.exempt.extend(ids);
        self
    }

    pub fn validate_snapshot(&self, snapshot: &GraphSnapshot) -> ValidationReport {
        self.validate(snapshot.nodes(), snapshot.edges())
    }

    /// Validate arbitrary records, including ones read back from storage.
    pub fn validate<'a>(
        &self,
        nodes: impl IntoIterator<Item = &'a Node>,
        edges: impl IntoIterator<Item = &'a Edge>,
    ) -> ValidationReport {
        let mut violations = Vec::new();

        let mut node_ids: BTreeMap<&NodeId, &Node> = BTreeMap::new();
        let mut duplicate_nodes = BTreeSet::new();
        for node in nodes {
            if node_ids.insert(&node.id, node).is_some() {
                duplicate_nodes.insert(&node.id);
            }
        }
        for id in duplicate_nodes {
            violations.push(Violation {
                code: ViolationCode::DuplicateNode,
                message: format!("node {} appears more than once", id),
                node: Some(id.clone()),
                edge: None,
            });
        }

        let mut seen_edges = HashSet::new();
        let mut reported_duplicates = HashSet::new();
        let mut connected: HashSet<&NodeId> = HashSet::new();
        for edge in edges {
            if !seen_edges.insert(&edge.id) {
                if reported_duplicates.insert(&edge.id) {
                    violations.push(Violation {
                        code: ViolationCode::DuplicateEdge,
                        message: format!("edge {} appears more than once", edge.id),
                        node: None,
                        edge: Some(edge.id.clone()),
                    });
                }
                continue;
            }
            if edge.id != EdgeId::derive(&edge.source, &edge.target, edge.relation) {
                violations.push(Violation {
                    code: ViolationCode::EdgeIdMismatch,
                    message: format!(
                        "edge {} does not match {} -> {} ({})",
                        edge.id, edge.source, edge.target, edge.relation
                    ),
                    node: None,
                    edge: Some(edge.id.clone()),
                });
            }

            let mut dangling = false;
            for endpoint in [&edge.source, &edge.target] {
                if !node_ids.contains_key(endpoint) {
                    dangling = true;
                    violations.push(Violation {
                        code: ViolationCode::DanglingEdge,
                        message: format!("edge {} references missing node {}", edge.id, endpoint),
                        node: Some(endpoint.clone()),
                        edge: Some(edge.id.clone()),
                    });
                }
            }
            if !dangling {
                connected.insert(&edge.source);
                connected.insert(&edge.target);
            }
        }

        for (id, node) in &node_ids {
            if connected.contains(*id) || node.kind.is_orphan_exempt() || self.exempt.contains(*id) {
                continue;
            }
            violations.push(Violation {
                code: ViolationCode::OrphanNode,
                message: format!("{} {} has no relationships", node.kind, id),
                node: Some((*id).clone()),
                edge: None,
            });
        }

        ValidationReport::from_violations(violations)
    }
}
