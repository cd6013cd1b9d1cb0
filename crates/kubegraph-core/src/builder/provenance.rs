//! Which resource declared which edge.

use std::collections::{BTreeSet, HashMap};

use crate::model::{EdgeId, NodeId};
use crate::rules::EdgeOrigin;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EdgeSource {
    pub declarer: NodeId,
    pub origin: EdgeOrigin,
}

/// Edge ownership by declaring resource, live and pending alike.
#[derive(Debug, Default)]
pub(crate) struct Provenance {
    declared: HashMap<NodeId, BTreeSet<EdgeId>>,
    sources: HashMap<EdgeId, EdgeSource>,
}

impl Provenance {
    pub fn record(&mut self, edge: EdgeId, declarer: &NodeId, origin: EdgeOrigin) {
        self.declared
            .entry(declarer.clone())
            .or_default()
            .insert(edge.clone());
        self.sources.insert(
            edge,
            EdgeSource {
                declarer: declarer.clone(),
                origin,
            },
        );
    }

    pub fn forget(&mut self, edge: &EdgeId) -> Option<EdgeSource> {
        let source = self.sources.remove(edge)?;
        if let Some(set) = self.declared.get_mut(&source.declarer) {
            set.remove(edge);
            if set.is_empty() {
                self.declared.remove(&source.declarer);
            }
        }
        Some(source)
    }

    /// Remove and return everything `declarer` declared.
    pub fn take_declared(&mut self, declarer: &NodeId) -> BTreeSet<EdgeId> {
        let edges = self.declared.remove(declarer).unwrap_or_default();
        for edge in &edges {
            self.sources.remove(edge);
        }
        edges
    }

    pub fn declared_by(&self, declarer: &NodeId, edge: &EdgeId) -> bool {
        self.declared
            .get(declarer)
            .map_or(false, |set| set.contains(edge))
    }

    pub fn source(&self, edge: &EdgeId) -> Option<&EdgeSource> {
        self.sources.get(edge)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Relation, ResourceKind};

    #[test]
    fn test_record_and_forget() {
        let pod = NodeId::new(ResourceKind::Pod, Some("ns"), "p");
        let cm = NodeId::new(ResourceKind::ConfigMap, Some("ns"), "c");
        let edge = EdgeId::derive(&pod, &cm, Relation::VolumeReference);

        let mut provenance = Provenance::default();
        provenance.record(edge.clone(), &pod, EdgeOrigin::Reference);
        assert!(provenance.declared_by(&pod, &edge));

        let source = provenance.forget(&edge).unwrap();
        assert_eq!(source.declarer, pod);
        assert!(!provenance.declared_by(&pod, &edge));
        assert!(provenance.take_declared(&pod).is_empty());
        assert_eq!(provenance.len(), 0);
    }
}
