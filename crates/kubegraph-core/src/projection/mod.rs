//! Filtered and focused sub-graphs of a snapshot.
//!
//! Projections are pure functions over an immutable [`GraphSnapshot`].
//! Long traversals poll a [`CancellationToken`]; a cancelled call returns
//! [`ProjectionError::Cancelled`] and leaves nothing behind.

mod filter;

pub use filter::{Depth, Direction, Focus, GraphFilter};

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::model::{Edge, Node, NodeId};
use crate::store::GraphSnapshot;

/// Nodes scanned between cancellation checks.
const CANCEL_CHECK_STRIDE: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Projection cancelled")]
    Cancelled,
}

/// A self-contained sub-graph: every edge has both endpoints in `nodes`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Nodes allowed to have no incident edge in this projection.
    pub exempt: BTreeSet<NodeId>,
}

/// Result of an ego traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct EgoNetwork {
    pub focus: NodeId,
    /// Hop distance of every included node from the focus.
    pub hops: BTreeMap<NodeId, usize>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl EgoNetwork {
    pub fn contains(&self, id: &NodeId) -> bool {
        self.hops.contains_key(id)
    }
}

/// Everything reachable from `focus` within `depth` hops, with every edge
/// between included nodes.
pub fn ego_network(
    snapshot: &GraphSnapshot,
    focus: &NodeId,
    depth: Depth,
    direction: Direction,
    cancel: &CancellationToken,
) -> Result<EgoNetwork, ProjectionError> {
    traverse(snapshot, focus, depth, direction, |_| true, cancel)
}

/// Apply a full filter to a snapshot.
pub fn project(
    snapshot: &GraphSnapshot,
    filter: &GraphFilter,
    cancel: &CancellationToken,
) -> Result<Projection, ProjectionError> {
    if let Some(focus) = &filter.focus {
        let ego = traverse(snapshot, &focus.node, focus.depth, focus.direction, |n| filter.admits(n), cancel)?;
        return Ok(Projection {
            nodes: ego.nodes,
            edges: ego.edges,
            exempt: BTreeSet::from([ego.focus]),
        });
    }

    let mut kept: BTreeMap<&NodeId, &Node> = BTreeMap::new();
    for (i, node) in snapshot.nodes().enumerate() {
        if i % CANCEL_CHECK_STRIDE == 0 && cancel.is_cancelled() {
            return Err(ProjectionError::Cancelled);
        }
        if filter.admits(node) {
            kept.insert(&node.id, node);
        }
    }

    let edges = snapshot
        .edges()
        .filter(|e| kept.contains_key(&e.source) && kept.contains_key(&e.target))
        .cloned()
        .collect();

    Ok(Projection {
        nodes: kept.into_values().cloned().collect(),
        edges,
        exempt: BTreeSet::new(),
    })
}

fn traverse(
    snapshot: &GraphSnapshot,
    focus: &NodeId,
    depth: Depth,
    direction: Direction,
    admits: impl Fn(&Node) -> bool,
    cancel: &CancellationToken,
) -> Result<EgoNetwork, ProjectionError> {
    if !snapshot.contains_node(focus) {
        return Err(ProjectionError::NodeNotFound(focus.clone()));
    }

    let mut hops: BTreeMap<NodeId, usize> = BTreeMap::from([(focus.clone(), 0)]);
    let mut queue = VecDeque::from([(focus.clone(), 0usize)]);

    while let Some((id, dist)) = queue.pop_front() {
        if cancel.is_cancelled() {
            return Err(ProjectionError::Cancelled);
        }
        if !depth.allows(dist + 1) {
            continue;
        }

        let outgoing = matches!(direction, Direction::Both | Direction::Outgoing)
            .then(|| snapshot.outgoing(&id).map(|e| &e.target));
        let incoming = matches!(direction, Direction::Both | Direction::Incoming)
            .then(|| snapshot.incoming(&id).map(|e| &e.source));
        let next: Vec<NodeId> = outgoing
            .into_iter()
            .flatten()
            .chain(incoming.into_iter().flatten())
            .filter(|n| !hops.contains_key(*n))
            .filter(|n| snapshot.node(n).is_some_and(&admits))
            .cloned()
            .collect();

        for neighbor in next {
            if hops.contains_key(&neighbor) {
                continue;
            }
            hops.insert(neighbor.clone(), dist + 1);
            queue.push_back((neighbor, dist + 1));
        }
    }

    let nodes: Vec<Node> = hops.keys().filter_map(|id| snapshot.node(id)).cloned().collect();
    let mut edge_ids = BTreeSet::new();
    for id in hops.keys() {
        for edge in snapshot.outgoing(id) {
            if hops.contains_key(&edge.target) {
                edge_ids.insert(&edge.id);
            }
        }
    }
    let edges = edge_ids.into_iter().filter_map(|id| snapshot.edge(id)).cloned().collect();

    Ok(EgoNetwork {
        focus: focus.clone(),
        hops,
        nodes,
        edges,
    })
}
