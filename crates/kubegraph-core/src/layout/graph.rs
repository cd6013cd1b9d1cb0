//! Index-based graph handed to layout strategies.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Edge, EdgeId, Node, NodeId};

/// Nodes sorted by id with edges as index pairs.
///
/// Edges whose endpoints are not both in the node set are dropped, parallel
/// edges (different relations between the same pair) collapse to one link,
/// and edge order is by edge id. Strategies therefore see the same input for
/// the same topology no matter how it was assembled.
#[derive(Debug, Clone, Default)]
pub struct LayoutGraph {
    pub(crate) ids: Vec<NodeId>,
    pub(crate) edge_ids: Vec<EdgeId>,
    pub(crate) links: Vec<(usize, usize)>,
    pub(crate) neighbors: Vec<Vec<usize>>,
}

impl LayoutGraph {
    pub fn new<'a>(
        nodes: impl IntoIterator<Item = &'a Node>,
        edges: impl IntoIterator<Item = &'a Edge>,
    ) -> Self {
        let ids: Vec<NodeId> = nodes
            .into_iter()
            .map(|n| n.id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: BTreeMap<&NodeId, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

        let mut sorted_edges: Vec<&Edge> = edges.into_iter().collect();
        sorted_edges.sort_by(|a, b| a.id.cmp(&b.id));
        sorted_edges.dedup_by(|a, b| a.id == b.id);

        let mut edge_ids = Vec::new();
        let mut links = Vec::new();
        let mut seen = BTreeSet::new();
        let mut neighbors = vec![Vec::new(); ids.len()];
        for edge in sorted_edges {
            let (Some(&s), Some(&t)) = (index.get(&edge.source), index.get(&edge.target)) else {
                continue;
            };
            if s == t {
                continue;
            }
            edge_ids.push(edge.id.clone());
            let key = (s.min(t), s.max(t));
            if seen.insert(key) {
                links.push((s, t));
                neighbors[s].push(t);
                neighbors[t].push(s);
            }
        }
        for list in &mut neighbors {
            list.sort_unstable();
        }

        Self {
            ids,
            edge_ids,
            links,
            neighbors,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    /// Connected components, each sorted, ordered by size (largest first)
    /// then by smallest member.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut component = vec![usize::MAX; self.len()];
        let mut components: Vec<Vec<usize>> = Vec::new();

        for start in 0..self.len() {
            if component[start] != usize::MAX {
                continue;
            }
            let label = components.len();
            let mut members = vec![start];
            component[start] = label;
            let mut stack = vec![start];
            while let Some(v) = stack.pop() {
                for &w in &self.neighbors[v] {
                    if component[w] == usize::MAX {
                        component[w] = label;
                        members.push(w);
                        stack.push(w);
                    }
                }
            }
            members.sort_unstable();
            components.push(members);
        }

        components.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));
        components
    }
}
