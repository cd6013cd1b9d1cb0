//! Edges waiting for a missing endpoint.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use crate::model::{Edge, EdgeId, NodeId};

#[derive(Debug, Clone)]
struct Entry {
    edge: Edge,
    queued_at: Instant,
}

/// A pending edge dropped because its endpoint never appeared.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiredEdge {
    pub edge: Edge,
    pub missing: NodeId,
    pub age: Duration,
}

/// Pending edges keyed by the endpoint they are waiting for.
#[derive(Debug, Default)]
pub struct PendingEdges {
    by_missing: HashMap<NodeId, BTreeMap<EdgeId, Entry>>,
    keys: HashMap<EdgeId, NodeId>,
}

impl PendingEdges {
    /// Queue `edge` until `missing` appears. A re-queued edge keeps its
    /// original queue time.
    pub fn insert(&mut self, missing: NodeId, edge: Edge, now: Instant) {
        let queued_at = match self.remove(&edge.id) {
            Some((_, previous)) => previous.queued_at,
            None => now,
        };
        self.keys.insert(edge.id.clone(), missing.clone());
        self.by_missing
            .entry(missing)
            .or_default()
            .insert(edge.id.clone(), Entry { edge, queued_at });
    }

    fn remove(&mut self, id: &EdgeId) -> Option<(NodeId, Entry)> {
        let key = self.keys.remove(id)?;
        let bucket = self.by_missing.get_mut(&key)?;
        let entry = bucket.remove(id)?;
        if bucket.is_empty() {
            self.by_missing.remove(&key);
        }
        Some((key, entry))
    }

    /// Drop a pending edge. Returns true if it was queued.
    pub fn discard(&mut self, id: &EdgeId) -> bool {
        self.remove(id).is_some()
    }

    pub fn contains(&self, id: &EdgeId) -> bool {
        self.keys.contains_key(id)
    }

    /// Take every edge waiting for `id`, with its queue time.
    pub fn take(&mut self, id: &NodeId) -> Vec<(Edge, Instant)> {
        let Some(bucket) = self.by_missing.remove(id) else {
            return Vec::new();
        };
        bucket
            .into_values()
            .map(|entry| {
                self.keys.remove(&entry.edge.id);
                (entry.edge, entry.queued_at)
            })
            .collect()
    }

    /// Drop edges whose other endpoint is `id`.
    pub fn purge_endpoint(&mut self, id: &NodeId) -> usize {
        let doomed: Vec<EdgeId> = self
            .by_missing
            .values()
            .flat_map(|bucket| bucket.values())
            .filter(|entry| &entry.edge.source == id || &entry.edge.target == id)
            .map(|entry| entry.edge.id.clone())
            .collect();
        for edge_id in &doomed {
            self.remove(edge_id);
        }
        doomed.len()
    }

    /// Drop entries that waited longer than `horizon`.
    ///
    /// `clock_start` gives the instant from which waiting for a missing id
    /// counts, or `None` while that id may still show up on its own. An entry
    /// ages from the later of its queue time and that instant.
    pub fn expire<F>(&mut self, now: Instant, horizon: Duration, clock_start: F) -> Vec<ExpiredEdge>
    where
        F: Fn(&NodeId) -> Option<Instant>,
    {
        let mut expired = Vec::new();
        for (missing, bucket) in self.by_missing.iter_mut() {
            let Some(ready) = clock_start(missing) else {
                continue;
            };
            bucket.retain(|_, entry| {
                let age = now.saturating_duration_since(entry.queued_at.max(ready));
                if age > horizon {
                    expired.push(ExpiredEdge {
                        edge: entry.edge.clone(),
                        missing: missing.clone(),
                        age,
                    });
                    false
                } else {
                    true
                }
            });
        }
        self.by_missing.retain(|_, bucket| !bucket.is_empty());
        for e in &expired {
            self.keys.remove(&e.edge.id);
        }
        expired.sort_by(|a, b| a.edge.id.cmp(&b.edge.id));
        expired
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Pending edges with the id they wait for, in edge id order.
    pub fn entries(&self) -> Vec<(&NodeId, &Edge)> {
        let mut all: Vec<_> = self
            .by_missing
            .iter()
            .flat_map(|(missing, bucket)| bucket.values().map(move |e| (missing, &e.edge)))
            .collect();
        all.sort_by(|a, b| a.1.id.cmp(&b.1.id));
        all
    }
}
