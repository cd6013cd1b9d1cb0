//! Incremental graph maintenance.
//!
//! [`TopologyBuilder`] is the only writer of the [`GraphStore`]. Every event
//! touches the event's own node, the edges that node declares, and the
//! selector edges held by same-namespace resources that may select it.

mod error;
mod provenance;

pub use error::ApplyError;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::event::{Action, WatchEvent};
use crate::model::{EdgeId, NodeId, Resource, ResourceKind};
use crate::rules::{
    Diagnostic, EdgeOrigin, InferredEdge, RelationshipRule, ResourceCatalog, RuleRegistry,
};
use crate::store::{EdgeOutcome, ExpiredEdge, GraphDelta, GraphSnapshot, GraphStore, NodeOutcome};
use provenance::Provenance;

/// Effect of one applied event on its own node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Created,
    Updated,
    Unchanged,
    Removed,
    /// Delete of an object that was never seen.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub node: NodeId,
    pub outcome: EventOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

/// Running counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderStats {
    pub events_applied: u64,
    pub objects_rejected: u64,
    pub diagnostics: u64,
    pub edges_expired: u64,
    pub pending_edges: usize,
}

/// Applies watch events to the graph store.
#[derive(Debug)]
pub struct TopologyBuilder {
    store: GraphStore,
    catalog: ResourceCatalog,
    rules: RuleRegistry,
    provenance: Provenance,
    /// When each kind finished its initial listing.
    synced: BTreeMap<ResourceKind, Instant>,
    started: Instant,
    stats: BuilderStats,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::with_rules(RuleRegistry::new())
    }

    pub fn with_rules(rules: RuleRegistry) -> Self {
        Self {
            store: GraphStore::new(),
            catalog: ResourceCatalog::new(),
            rules,
            provenance: Provenance::default(),
            synced: BTreeMap::new(),
            started: Instant::now(),
            stats: BuilderStats::default(),
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.store.snapshot()
    }

    pub fn take_delta(&mut self) -> GraphDelta {
        self.store.take_delta()
    }

    pub fn stats(&self) -> BuilderStats {
        BuilderStats {
            pending_edges: self.store.pending().len(),
            ..self.stats.clone()
        }
    }

    /// Record that the initial listing of `kind` finished.
    pub fn mark_synced(&mut self, kind: ResourceKind) {
        self.mark_synced_at(kind, Instant::now());
    }

    /// Like [`TopologyBuilder::mark_synced`] with an explicit time. A kind
    /// keeps the time of its first marker.
    pub fn mark_synced_at(&mut self, kind: ResourceKind, at: Instant) {
        if let std::collections::btree_map::Entry::Vacant(slot) = self.synced.entry(kind) {
            slot.insert(at);
            debug!(kind = %kind, "Initial sync complete");
        }
    }

    pub fn is_synced(&self, kind: ResourceKind) -> bool {
        self.synced.contains_key(&kind)
    }

    /// True once every modeled kind has reported its initial sync.
    pub fn fully_synced(&self) -> bool {
        self.synced.len() == ResourceKind::ALL.len()
    }

    /// Apply one event. Errors leave the graph untouched.
    pub fn apply(&mut self, event: &WatchEvent) -> Result<ApplyReport, ApplyError> {
        let result = match event.action {
            Action::Add | Action::Update => self.upsert(event.kind, &event.object),
            Action::Delete => self.delete(event.kind, &event.object),
        };

        match &result {
            Ok(report) => {
                self.stats.events_applied += 1;
                self.stats.diagnostics += report.diagnostics.len() as u64;
                for d in &report.diagnostics {
                    debug!(rule = %d.rule, resource = %d.resource, "{}", d.message);
                }
            }
            Err(err) => {
                self.stats.objects_rejected += 1;
                warn!(kind = %event.kind, action = ?event.action, error = %err, "Rejected watch event");
            }
        }
        result
    }

    /// Drop pending edges whose missing endpoint stayed absent for longer
    /// than `horizon` after its kind finished the initial sync.
    ///
    /// Edges waiting on a kind that has not synced yet are kept, since the
    /// endpoint may still be listed. Ids of unknown kinds age from their
    /// queue time.
    pub fn expire_pending(&mut self, now: Instant, horizon: Duration) -> Vec<ExpiredEdge> {
        let synced = &self.synced;
        let started = self.started;
        let expired = self.store.expire_pending(now, horizon, |missing| match missing.kind() {
            Some(kind) => synced.get(&kind).copied(),
            None => Some(started),
        });
        for e in &expired {
            self.provenance.forget(&e.edge.id);
            warn!(edge = %e.edge.id, missing = %e.missing, age_secs = e.age.as_secs(), "Unresolved reference dropped");
        }
        self.stats.edges_expired += expired.len() as u64;
        expired
    }

    fn upsert(&mut self, kind: ResourceKind, object: &serde_json::Value) -> Result<ApplyReport, ApplyError> {
        let resource = Arc::new(Resource::from_json(kind, object)?);
        let id = resource.id();
        let change = self.store.upsert_node(resource.to_node(0))?;
        self.catalog.insert(Arc::clone(&resource));
        if !change.promoted.is_empty() {
            trace!(node = %id, promoted = change.promoted.len(), "Pending edges resolved");
        }

        let mut diagnostics = Vec::new();

        let output = self.rules.infer_all(&resource, &self.catalog);
        diagnostics.extend(output.diagnostics);
        let mut inferred: BTreeMap<EdgeId, InferredEdge> = BTreeMap::new();
        for item in output.edges {
            inferred.entry(item.edge.id.clone()).or_insert(item);
        }

        let previous = self.provenance.take_declared(&id);
        for stale in previous.iter().filter(|e| !inferred.contains_key(*e)) {
            self.store.remove_edge(stale);
        }
        for item in inferred.into_values() {
            self.place_edge(&id, item, &mut diagnostics);
        }

        self.reselect(&resource, &mut diagnostics);

        let outcome = match change.outcome {
            NodeOutcome::Created => EventOutcome::Created,
            NodeOutcome::Updated => EventOutcome::Updated,
            NodeOutcome::Unchanged => EventOutcome::Unchanged,
        };
        Ok(ApplyReport {
            node: id,
            outcome,
            diagnostics,
        })
    }

    /// Re-evaluate selectors in `target`'s namespace that may pick it up.
    fn reselect(&mut self, target: &Resource, diagnostics: &mut Vec<Diagnostic>) {
        let Some(ns) = target.namespace() else {
            return;
        };
        let target_id = target.id();
        let rules: Vec<Arc<dyn RelationshipRule>> = self.rules.rules().to_vec();

        for rule in rules {
            for &holder_kind in rule.selector_kinds(target.kind) {
                let holders: Vec<Arc<Resource>> = self
                    .catalog
                    .in_namespace(ns, holder_kind)
                    .cloned()
                    .collect();
                for holder in holders {
                    let holder_id = holder.id();
                    if holder_id == target_id {
                        continue;
                    }
                    match rule.infer_pair(&holder, target) {
                        Some(edge) => self.place_edge(
                            &holder_id,
                            InferredEdge {
                                edge,
                                origin: EdgeOrigin::Selector,
                            },
                            diagnostics,
                        ),
                        None => {
                            let edge_id = EdgeId::derive(&holder_id, &target_id, rule.relation());
                            if self.provenance.declared_by(&holder_id, &edge_id) {
                                self.provenance.forget(&edge_id);
                                self.store.remove_edge(&edge_id);
                            }
                        }
                    }
                }
            }
        }
    }

    fn place_edge(&mut self, declarer: &NodeId, item: InferredEdge, diagnostics: &mut Vec<Diagnostic>) {
        let edge_id = item.edge.id.clone();
        match self.store.upsert_edge(item.edge) {
            Ok(outcome) => {
                if let EdgeOutcome::Pending { missing } = &outcome {
                    trace!(edge = %edge_id, missing = %missing, "Edge pending");
                }
                self.provenance.record(edge_id, declarer, item.origin);
            }
            Err(err) => diagnostics.push(Diagnostic {
                rule: "store".to_string(),
                resource: declarer.clone(),
                message: err.to_string(),
            }),
        }
    }

    fn delete(&mut self, kind: ResourceKind, object: &serde_json::Value) -> Result<ApplyReport, ApplyError> {
        let resource = Resource::from_json(kind, object)?;
        let id = resource.id();

        let known = self.catalog.remove(&id).is_some();
        if !known && !self.store.contains_node(&id) {
            return Ok(ApplyReport {
                node: id,
                outcome: EventOutcome::Ignored,
                diagnostics: Vec::new(),
            });
        }

        for edge_id in self.provenance.take_declared(&id) {
            self.store.remove_edge(&edge_id);
        }

        let mut diagnostics = Vec::new();
        if let Some(removed) = self.store.remove_node(&id) {
            for edge in removed.edges {
                match self.provenance.source(&edge.id).map(|s| s.origin) {
                    // Named references come back if the object is recreated.
                    Some(EdgeOrigin::Reference) => {
                        if let Err(err) = self.store.upsert_edge(edge) {
                            diagnostics.push(Diagnostic {
                                rule: "store".to_string(),
                                resource: id.clone(),
                                message: err.to_string(),
                            });
                        }
                    }
                    Some(EdgeOrigin::Selector) => {
                        self.provenance.forget(&edge.id);
                    }
                    None => {}
                }
            }
        }

        Ok(ApplyReport {
            node: id,
            outcome: EventOutcome::Removed,
            diagnostics,
        })
    }
}

impl Default for TopologyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
