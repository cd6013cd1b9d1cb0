//! Change journal and the deltas streamed to live viewers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{Edge, EdgeId, Node, NodeId};

/// Changes between two published snapshots.
///
/// Consumers apply removals before additions. `added_nodes` carries both
/// created and updated nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDelta {
    pub version: u64,
    pub added_nodes: Vec<Node>,
    pub removed_node_ids: Vec<NodeId>,
    pub added_edges: Vec<Edge>,
    pub removed_edge_ids: Vec<EdgeId>,
}

impl GraphDelta {
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_node_ids.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edge_ids.is_empty()
    }
}

/// Ids touched since the journal was last drained.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    pub added_nodes: BTreeSet<NodeId>,
    pub removed_nodes: BTreeSet<NodeId>,
    pub added_edges: BTreeSet<EdgeId>,
    pub removed_edges: BTreeSet<EdgeId>,
}

impl Journal {
    pub fn node_upserted(&mut self, id: &NodeId) {
        self.added_nodes.insert(id.clone());
    }

    pub fn node_removed(&mut self, id: &NodeId) {
        self.added_nodes.remove(id);
        self.removed_nodes.insert(id.clone());
    }

    pub fn edge_upserted(&mut self, id: &EdgeId) {
        self.added_edges.insert(id.clone());
    }

    pub fn edge_removed(&mut self, id: &EdgeId) {
        self.added_edges.remove(id);
        self.removed_edges.insert(id.clone());
    }

    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
    }
}
