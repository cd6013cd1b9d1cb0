//! Immutable point-in-time view of the graph.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::model::{Edge, EdgeId, Node, NodeId};

type Adjacency = BTreeMap<NodeId, BTreeSet<EdgeId>>;

/// A consistent graph state.
///
/// All maps sit behind `Arc`s shared with the writer. The writer copies a
/// map only when it mutates it while a snapshot still holds the old one, so
/// taking a snapshot is a handful of reference-count increments.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    pub(crate) version: u64,
    pub(crate) nodes: Arc<BTreeMap<NodeId, Node>>,
    pub(crate) edges: Arc<BTreeMap<EdgeId, Edge>>,
    pub(crate) outgoing: Arc<Adjacency>,
    pub(crate) incoming: Arc<Adjacency>,
}

impl GraphSnapshot {
    /// Number of store mutations applied when this snapshot was taken.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn outgoing(&self, id: &NodeId) -> impl Iterator<Item = &Edge> {
        self.adjacent(&self.outgoing, id)
    }

    pub fn incoming(&self, id: &NodeId) -> impl Iterator<Item = &Edge> {
        self.adjacent(&self.incoming, id)
    }

    /// Number of edges touching `id`.
    pub fn degree(&self, id: &NodeId) -> usize {
        self.outgoing.get(id).map_or(0, BTreeSet::len) + self.incoming.get(id).map_or(0, BTreeSet::len)
    }

    fn adjacent<'a>(&'a self, index: &'a Adjacency, id: &NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        index
            .get(id)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|edge_id| self.edges.get(edge_id))
    }

    /// Owned copy of the records, for serialization.
    pub fn to_records(&self) -> GraphRecords {
        GraphRecords {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
        }
    }
}

/// Plain node and edge lists, in id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphRecords {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}
