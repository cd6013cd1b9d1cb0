//! In-memory graph store.
//!
//! The store owns every node and edge record. It is mutated by a single
//! writer (the builder) and hands out [`GraphSnapshot`]s that share
//! structure with the live state until the next write touches them.

mod delta;
mod error;
mod pending;
mod snapshot;

pub use delta::GraphDelta;
pub use error::StoreError;
pub use pending::{ExpiredEdge, PendingEdges};
pub use snapshot::{GraphRecords, GraphSnapshot};

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::model::{Edge, EdgeId, Node, NodeId, Relation};
use delta::Journal;

/// What an upsert did to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    Created,
    Updated,
    /// Same content as the stored node; nothing changed.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeChange {
    pub outcome: NodeOutcome,
    pub revision: u64,
    /// Pending edges that materialized because this node appeared.
    pub promoted: Vec<EdgeId>,
}

/// What an upsert did to an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeOutcome {
    Inserted,
    /// Same identity, different label.
    Updated,
    Unchanged,
    /// An endpoint is missing; the edge waits in the pending table.
    Pending { missing: NodeId },
}

/// A node removed together with its incident edges.
#[derive(Debug, Clone)]
pub struct RemovedNode {
    pub node: Node,
    pub edges: Vec<Edge>,
}

/// Node and edge records with lookup indices.
#[derive(Debug, Default)]
pub struct GraphStore {
    state: GraphSnapshot,
    by_namespace: HashMap<String, BTreeSet<NodeId>>,
    pending: PendingEdges,
    journal: Journal,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.state.version
    }

    /// Consistent view of the current state.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.state.clone()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.state.nodes.get(id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.state.nodes.contains_key(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.state.edges.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.state.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state.edges.len()
    }

    /// Insert a node, or overwrite the node with the same id.
    ///
    /// The stored revision starts at 1 and is bumped whenever the content
    /// changes; the caller's revision is ignored.
    pub fn upsert_node(&mut self, mut node: Node) -> Result<NodeChange, StoreError> {
        let expected = NodeId::new(node.kind, node.namespace.as_deref(), &node.name);
        if expected != node.id {
            return Err(StoreError::NodeIdMismatch { id: node.id });
        }

        if let Some(existing) = self.state.nodes.get(&node.id) {
            if existing.same_content(&node) {
                return Ok(NodeChange {
                    outcome: NodeOutcome::Unchanged,
                    revision: existing.revision,
                    promoted: Vec::new(),
                });
            }
            node.revision = existing.revision + 1;
            let revision = node.revision;
            self.journal.node_upserted(&node.id);
            Arc::make_mut(&mut self.state.nodes).insert(node.id.clone(), node);
            self.state.version += 1;
            return Ok(NodeChange {
                outcome: NodeOutcome::Updated,
                revision,
                promoted: Vec::new(),
            });
        }

        node.revision = 1;
        let id = node.id.clone();
        if let Some(ns) = &node.namespace {
            self.by_namespace
                .entry(ns.clone())
                .or_default()
                .insert(id.clone());
        }
        self.journal.node_upserted(&id);
        Arc::make_mut(&mut self.state.nodes).insert(id.clone(), node);
        self.state.version += 1;

        let mut promoted = Vec::new();
        for (edge, queued_at) in self.pending.take(&id) {
            match self.missing_endpoint(&edge) {
                None => {
                    promoted.push(edge.id.clone());
                    self.insert_live(edge);
                }
                Some(other) => self.pending.insert(other, edge, queued_at),
            }
        }

        Ok(NodeChange {
            outcome: NodeOutcome::Created,
            revision: 1,
            promoted,
        })
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<RemovedNode> {
        if !self.state.nodes.contains_key(id) {
            return None;
        }

        let incident: BTreeSet<EdgeId> = self
            .state
            .outgoing
            .get(id)
            .into_iter()
            .chain(self.state.incoming.get(id))
            .flat_map(|ids| ids.iter().cloned())
            .collect();
        let edges = incident
            .iter()
            .filter_map(|edge_id| self.remove_live(edge_id))
            .collect();

        let node = Arc::make_mut(&mut self.state.nodes).remove(id)?;
        if let Some(ns) = &node.namespace {
            if let Some(ids) = self.by_namespace.get_mut(ns) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_namespace.remove(ns);
                }
            }
        }
        self.pending.purge_endpoint(id);
        self.journal.node_removed(id);
        self.state.version += 1;

        Some(RemovedNode { node, edges })
    }

    pub fn upsert_edge(&mut self, edge: Edge) -> Result<EdgeOutcome, StoreError> {
        self.upsert_edge_at(edge, Instant::now())
    }

    /// Insert an edge, or queue it as pending when an endpoint is missing.
    pub fn upsert_edge_at(&mut self, edge: Edge, now: Instant) -> Result<EdgeOutcome, StoreError> {
        if edge.id != EdgeId::derive(&edge.source, &edge.target, edge.relation) {
            return Err(StoreError::EdgeIdMismatch(edge.id));
        }
        if edge.source == edge.target {
            return Err(StoreError::SelfLoop(edge.id));
        }

        if let Some(missing) = self.missing_endpoint(&edge) {
            self.pending.insert(missing.clone(), edge, now);
            return Ok(EdgeOutcome::Pending { missing });
        }

        let outcome = match self.state.edges.get(&edge.id) {
            Some(existing) if existing == &edge => return Ok(EdgeOutcome::Unchanged),
            Some(_) => EdgeOutcome::Updated,
            None => EdgeOutcome::Inserted,
        };
        self.pending.discard(&edge.id);
        self.insert_live(edge);
        Ok(outcome)
    }

    /// Remove a live or pending edge. Returns true if anything was removed.
    pub fn remove_edge(&mut self, id: &EdgeId) -> bool {
        self.remove_live(id).is_some() || self.pending.discard(id)
    }

    /// Nodes owned by `id` through ownership edges, in id order.
    pub fn nodes_by_owner(&self, id: &NodeId) -> Vec<&Node> {
        self.state
            .outgoing(id)
            .filter(|e| e.relation == Relation::Ownership)
            .filter_map(|e| self.state.nodes.get(&e.target))
            .collect()
    }

    /// Nodes in namespace `ns`, in id order. Does not include the namespace node.
    pub fn nodes_in_namespace(&self, ns: &str) -> Vec<&Node> {
        self.by_namespace
            .get(ns)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.state.nodes.get(id))
            .collect()
    }

    pub fn pending(&self) -> &PendingEdges {
        &self.pending
    }

    /// Drop pending edges that waited longer than `horizon`. See
    /// [`PendingEdges::expire`] for `clock_start`.
    pub fn expire_pending<F>(&mut self, now: Instant, horizon: Duration, clock_start: F) -> Vec<ExpiredEdge>
    where
        F: Fn(&NodeId) -> Option<Instant>,
    {
        self.pending.expire(now, horizon, clock_start)
    }

    /// Whether anything changed since the last [`GraphStore::take_delta`].
    pub fn has_changes(&self) -> bool {
        !self.journal.is_empty()
    }

    /// Drain the change journal into a delta against the current state.
    pub fn take_delta(&mut self) -> GraphDelta {
        let journal = std::mem::take(&mut self.journal);
        GraphDelta {
            version: self.state.version,
            added_nodes: journal
                .added_nodes
                .iter()
                .filter_map(|id| self.state.nodes.get(id).cloned())
                .collect(),
            removed_node_ids: journal.removed_nodes.into_iter().collect(),
            added_edges: journal
                .added_edges
                .iter()
                .filter_map(|id| self.state.edges.get(id).cloned())
                .collect(),
            removed_edge_ids: journal.removed_edges.into_iter().collect(),
        }
    }

    fn missing_endpoint(&self, edge: &Edge) -> Option<NodeId> {
        [&edge.source, &edge.target]
            .into_iter()
            .find(|id| !self.state.nodes.contains_key(*id))
            .cloned()
    }

    fn insert_live(&mut self, edge: Edge) {
        Arc::make_mut(&mut self.state.outgoing)
            .entry(edge.source.clone())
            .or_default()
            .insert(edge.id.clone());
        Arc::make_mut(&mut self.state.incoming)
            .entry(edge.target.clone())
            .or_default()
            .insert(edge.id.clone());
        self.journal.edge_upserted(&edge.id);
        Arc::make_mut(&mut self.state.edges).insert(edge.id.clone(), edge);
        self.state.version += 1;
    }

    fn remove_live(&mut self, id: &EdgeId) -> Option<Edge> {
        if !self.state.edges.contains_key(id) {
            return None;
        }
        let edge = Arc::make_mut(&mut self.state.edges).remove(id)?;
        for (index, endpoint) in [
            (&mut self.state.outgoing, &edge.source),
            (&mut self.state.incoming, &edge.target),
        ] {
            let index = Arc::make_mut(index);
            if let Some(ids) = index.get_mut(endpoint) {
                ids.remove(id);
                if ids.is_empty() {
                    index.remove(endpoint);
                }
            }
        }
        self.journal.edge_removed(id);
        self.state.version += 1;
        Some(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HealthStatus, ResourceKind};
    use std::collections::BTreeMap;

    fn node(kind: ResourceKind, ns: Option<&str>, name: &str) -> Node {
        Node {
            id: NodeId::new(kind, ns, name),
            kind,
            name: name.to_string(),
            namespace: ns.map(str::to_string),
            uid: None,
            status: HealthStatus::Healthy,
            revision: 0,
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_upsert_node_bumps_revision_only_on_change() {
        let mut store = GraphStore::new();
        let pod = node(ResourceKind::Pod, Some("ns"), "p");

        assert_eq!(store.upsert_node(pod.clone()).unwrap().outcome, NodeOutcome::Created);
        let again = store.upsert_node(pod.clone()).unwrap();
        assert_eq!(again.outcome, NodeOutcome::Unchanged);
        assert_eq!(again.revision, 1);

        let mut changed = pod;
        changed.status = HealthStatus::Degraded;
        let change = store.upsert_node(changed).unwrap();
        assert_eq!(change.outcome, NodeOutcome::Updated);
        assert_eq!(change.revision, 2);
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_pending_edge_promoted_on_arrival() {
        let mut store = GraphStore::new();
        let pod = node(ResourceKind::Pod, Some("ns"), "p");
        let cm = node(ResourceKind::ConfigMap, Some("ns"), "c");
        store.upsert_node(pod.clone()).unwrap();

        let edge = Edge::new(pod.id.clone(), cm.id.clone(), Relation::VolumeReference);
        assert_eq!(
            store.upsert_edge(edge.clone()).unwrap(),
            EdgeOutcome::Pending { missing: cm.id.clone() }
        );
        assert_eq!(store.edge_count(), 0);
        assert_eq!(store.pending().len(), 1);

        let change = store.upsert_node(cm).unwrap();
        assert_eq!(change.promoted, vec![edge.id.clone()]);
        assert!(store.edge(&edge.id).is_some());
        assert!(store.pending().is_empty());
    }

    #[test]
    fn test_remove_node_cascades() {
        let mut store = GraphStore::new();
        let ns = node(ResourceKind::Namespace, None, "ns");
        let pod = node(ResourceKind::Pod, Some("ns"), "p");
        store.upsert_node(ns.clone()).unwrap();
        store.upsert_node(pod.clone()).unwrap();
        store
            .upsert_edge(Edge::new(ns.id.clone(), pod.id.clone(), Relation::NamespaceContainment))
            .unwrap();

        let removed = store.remove_node(&pod.id).unwrap();
        assert_eq!(removed.edges.len(), 1);
        assert_eq!(store.edge_count(), 0);
        assert_eq!(store.snapshot().degree(&ns.id), 0);
        assert!(store.nodes_in_namespace("ns").is_empty());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let mut store = GraphStore::new();
        store.upsert_node(node(ResourceKind::Namespace, None, "a")).unwrap();
        let before = store.snapshot();
        store.upsert_node(node(ResourceKind::Namespace, None, "b")).unwrap();

        assert_eq!(before.node_count(), 1);
        assert_eq!(store.snapshot().node_count(), 2);
        assert!(store.snapshot().version() > before.version());
    }

    #[test]
    fn test_rejects_forged_edge_id() {
        let mut store = GraphStore::new();
        let a = NodeId::namespace("a");
        let mut edge = Edge::new(a.clone(), NodeId::namespace("b"), Relation::Ownership);
        edge.relation = Relation::SelectorMatch;
        assert!(matches!(store.upsert_edge(edge), Err(StoreError::EdgeIdMismatch(_))));
        assert!(matches!(
            store.upsert_edge(Edge::new(a.clone(), a, Relation::Ownership)),
            Err(StoreError::SelfLoop(_))
        ));
    }

    #[test]
    fn test_delta_tracks_changes() {
        let mut store = GraphStore::new();
        let ns = node(ResourceKind::Namespace, None, "ns");
        let pod = node(ResourceKind::Pod, Some("ns"), "p");
        store.upsert_node(ns.clone()).unwrap();
        store.upsert_node(pod.clone()).unwrap();
        store
            .upsert_edge(Edge::new(ns.id.clone(), pod.id.clone(), Relation::NamespaceContainment))
            .unwrap();

        let delta = store.take_delta();
        assert_eq!(delta.added_nodes.len(), 2);
        assert_eq!(delta.added_edges.len(), 1);
        assert!(!store.has_changes());

        store.remove_node(&pod.id);
        let delta = store.take_delta();
        assert_eq!(delta.removed_node_ids, vec![pod.id]);
        assert_eq!(delta.removed_edge_ids.len(), 1);
        assert!(delta.added_nodes.is_empty());
    }

    #[test]
    fn test_nodes_by_owner() {
        let mut store = GraphStore::new();
        let rs = node(ResourceKind::ReplicaSet, Some("ns"), "rs");
        let pod = node(ResourceKind::Pod, Some("ns"), "p");
        store.upsert_node(rs.clone()).unwrap();
        store.upsert_node(pod.clone()).unwrap();
        store
            .upsert_edge(Edge::new(rs.id.clone(), pod.id.clone(), Relation::Ownership))
            .unwrap();

        let owned: Vec<_> = store.nodes_by_owner(&rs.id).iter().map(|n| n.id.clone()).collect();
        assert_eq!(owned, vec![pod.id]);
    }
}
