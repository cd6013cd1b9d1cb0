use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Node, NodeId, ResourceKind};

/// Hop limit for an ego network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Bounded(usize),
    Unbounded,
}

impl Depth {
    pub fn allows(&self, hops: usize) -> bool {
        match self {
            Self::Bounded(limit) => hops <= *limit,
            Self::Unbounded => true,
        }
    }
}

impl Default for Depth {
    fn default() -> Self {
        Self::Bounded(1)
    }
}

/// Which edges an ego traversal may follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Both,
    Outgoing,
    Incoming,
}

/// Focus node for a "blast radius" view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Focus {
    pub node: NodeId,
    #[serde(default)]
    pub depth: Depth,
    #[serde(default)]
    pub direction: Direction,
}

/// Narrows a graph view. Empty sets do not filter.
///
/// A node passes the namespace filter when it lives in one of the listed
/// namespaces or is the namespace node itself. Cluster-scoped nodes only
/// pass an empty namespace filter. Label filters compare against the
/// resource labels; every pair must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphFilter {
    pub namespaces: BTreeSet<String>,
    pub kinds: BTreeSet<ResourceKind>,
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<Focus>,
}

impl GraphFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespaces.insert(ns.into());
        self
    }

    pub fn kind(mut self, kind: ResourceKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn focus(mut self, node: NodeId, depth: Depth, direction: Direction) -> Self {
        self.focus = Some(Focus { node, depth, direction });
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.namespaces.is_empty() && self.kinds.is_empty() && self.labels.is_empty() && self.focus.is_none()
    }

    /// Namespace, kind and label checks. Focus is applied separately.
    pub fn admits(&self, node: &Node) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&node.kind) {
            return false;
        }
        if !self.namespaces.is_empty() {
            let inside = match &node.namespace {
                Some(ns) => self.namespaces.contains(ns),
                None => node.kind == ResourceKind::Namespace && self.namespaces.contains(&node.name),
            };
            if !inside {
                return false;
            }
        }
        if !self.labels.is_empty() {
            let labels = node.attributes.get("labels").and_then(|v| v.as_object());
            let matched = self.labels.iter().all(|(k, v)| {
                labels
                    .and_then(|l| l.get(k))
                    .and_then(|actual| actual.as_str())
                    .is_some_and(|actual| actual == v)
            });
            if !matched {
                return false;
            }
        }
        true
    }
}
