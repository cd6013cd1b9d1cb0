//! Persisted graph snapshots.

mod error;
mod file;

pub use error::StorageError;
pub use file::FileSnapshotStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::layout::{LayoutSeed, Position};
use crate::model::{Edge, Node, NodeId};

/// One persisted (graph, layout) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Store version the graph was taken at.
    pub version: u64,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub layout_seed: LayoutSeed,
    #[serde(default)]
    pub positions: BTreeMap<NodeId, Position>,
}

impl SnapshotRecord {
    pub fn to_ref(&self) -> SnapshotRef {
        SnapshotRef {
            id: self.id,
            timestamp: self.timestamp,
            version: self.version,
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            layout_seed: self.layout_seed.clone(),
        }
    }
}

/// Listing entry for a persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRef {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub version: u64,
    pub node_count: usize,
    pub edge_count: usize,
    pub layout_seed: LayoutSeed,
}

/// Inclusive time window. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a record.
    async fn save(&self, record: &SnapshotRecord) -> Result<SnapshotRef, StorageError>;

    /// Records within `range`, oldest first.
    async fn list(&self, range: TimeRange) -> Result<Vec<SnapshotRef>, StorageError>;

    /// Load a record by id.
    async fn load(&self, id: Uuid) -> Result<SnapshotRecord, StorageError>;
}
