//! Read-side API over published snapshots.
//!
//! A [`GraphView`] is computed once per (snapshot version, filter) and
//! cached. Exports are rendered from the cached view, so what is exported
//! is exactly what is displayed.

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{Config, ConfigError};
use crate::engine::TopologyEngine;
use crate::export::{self, ExportError, ExportFormat, Scene};
use crate::history::{SnapshotRecord, SnapshotRef, SnapshotStore, StorageError, TimeRange};
use crate::layout::{Layout, LayoutEngine, LayoutSeed};
use crate::model::{Edge, Node};
use crate::projection::{self, GraphFilter, ProjectionError};
use crate::store::{GraphDelta, GraphSnapshot};
use crate::validate::{ValidationReport, Validator, Violation, ViolationCode};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Request cancelled")]
    Cancelled,

    #[error(transparent)]
    Projection(ProjectionError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl From<ProjectionError> for ServiceError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::Cancelled => Self::Cancelled,
            other => Self::Projection(other),
        }
    }
}

/// A filtered graph with the layout every consumer of it shares.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphView {
    pub version: u64,
    pub filter: GraphFilter,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub layout: Layout,
    pub layout_seed: LayoutSeed,
    pub validation: ValidationReport,
    /// The node cap cut the view short.
    pub truncated: bool,
    pub generated_at: DateTime<Utc>,
}

impl GraphView {
    pub fn scene(&self) -> Scene<'_> {
        Scene::new(&self.nodes, &self.edges, &self.layout)
    }
}

type ViewKey = (u64, GraphFilter);

/// Views kept per service, least recently used first out.
pub const VIEW_CACHE_CAPACITY: usize = 16;

/// Serves views, exports, deltas and snapshot history.
pub struct TopologyService {
    snapshots: watch::Receiver<Arc<GraphSnapshot>>,
    deltas: Option<broadcast::Sender<GraphDelta>>,
    layout: LayoutEngine,
    seed: Option<LayoutSeed>,
    max_nodes: usize,
    history: Arc<dyn SnapshotStore>,
    views: Mutex<LruCache<ViewKey, Arc<GraphView>>>,
}

impl TopologyService {
    /// Serve the snapshots published by a running engine.
    pub fn new(engine: &TopologyEngine, history: Arc<dyn SnapshotStore>, config: &Config) -> Result<Self, ConfigError> {
        let mut service = Self::with_receiver(engine.watch_snapshots(), history, config)?;
        service.deltas = Some(engine.delta_sender());
        Ok(service)
    }

    /// Serve one fixed snapshot, e.g. a graph built offline.
    pub fn from_snapshot(
        snapshot: GraphSnapshot,
        history: Arc<dyn SnapshotStore>,
        config: &Config,
    ) -> Result<Self, ConfigError> {
        let (_, rx) = watch::channel(Arc::new(snapshot));
        Self::with_receiver(rx, history, config)
    }

    fn with_receiver(
        snapshots: watch::Receiver<Arc<GraphSnapshot>>,
        history: Arc<dyn SnapshotStore>,
        config: &Config,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            snapshots,
            deltas: None,
            layout: LayoutEngine::from_config(&config.layout)?,
            seed: config.layout.seed(),
            max_nodes: config.export.max_nodes,
            history,
            views: Mutex::new(LruCache::new(
                NonZeroUsize::new(VIEW_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
        })
    }

    pub fn with_layout(mut self, layout: LayoutEngine) -> Self {
        self.layout = layout;
        self
    }

    /// Latest snapshot the service can see.
    pub fn current_snapshot(&self) -> Arc<GraphSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// The current graph narrowed by `filter`, laid out and validated.
    pub async fn get_current_graph(
        &self,
        filter: &GraphFilter,
        cancel: &CancellationToken,
    ) -> Result<Arc<GraphView>, ServiceError> {
        let snapshot = self.current_snapshot();
        let key = (snapshot.version(), filter.clone());
        if let Some(view) = self.cached(&key) {
            return Ok(view);
        }

        let job = ViewJob {
            snapshot,
            filter: filter.clone(),
            layout: self.layout.clone(),
            seed: self.seed.clone(),
            max_nodes: self.max_nodes,
            cancel: cancel.clone(),
        };
        let task = tokio::task::spawn_blocking(move || job.run());
        let view = tokio::select! {
            _ = cancel.cancelled() => return Err(ServiceError::Cancelled),
            joined = task => joined.map_err(|e| ServiceError::Worker(e.to_string()))??,
        };
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }

        let mut views = self.views.lock().unwrap_or_else(|e| e.into_inner());
        // Views for older versions can no longer be requested.
        let stale: Vec<ViewKey> = views
            .iter()
            .filter(|((version, _), _)| *version < key.0)
            .map(|(k, _)| k.clone())
            .collect();
        for k in &stale {
            views.pop(k);
        }
        // A concurrent request may have filled the slot first.
        let view = match views.get(&key) {
            Some(existing) => existing.clone(),
            None => {
                let view = Arc::new(view);
                views.put(key, Arc::clone(&view));
                view
            }
        };
        debug!(version = view.version, nodes = view.nodes.len(), "Computed graph view");
        Ok(view)
    }

    fn cached(&self, key: &ViewKey) -> Option<Arc<GraphView>> {
        let mut views = self.views.lock().unwrap_or_else(|e| e.into_inner());
        views.get(key).cloned()
    }

    /// Number of views currently cached.
    pub fn cached_views(&self) -> usize {
        self.views.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Render the live view for `filter` in `format`.
    pub async fn render_export(
        &self,
        format: ExportFormat,
        filter: &GraphFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ServiceError> {
        let view = self.get_current_graph(filter, cancel).await?;
        let task = tokio::task::spawn_blocking(move || export::render(format, &view.scene()));
        tokio::select! {
            _ = cancel.cancelled() => Err(ServiceError::Cancelled),
            joined = task => Ok(joined.map_err(|e| ServiceError::Worker(e.to_string()))??),
        }
    }

    /// Persist the unfiltered current graph and its layout.
    ///
    /// History always holds the whole graph. The node cap only bounds served
    /// views, so a truncated view is laid out again without it.
    pub async fn persist_snapshot(&self) -> Result<SnapshotRef, ServiceError> {
        let cancel = CancellationToken::new();
        let mut view = self.get_current_graph(&GraphFilter::all(), &cancel).await?;
        if view.truncated {
            let job = ViewJob {
                snapshot: self.current_snapshot(),
                filter: GraphFilter::all(),
                layout: self.layout.clone(),
                seed: self.seed.clone(),
                max_nodes: usize::MAX,
                cancel,
            };
            let full = tokio::task::spawn_blocking(move || job.run())
                .await
                .map_err(|e| ServiceError::Worker(e.to_string()))??;
            debug!(shown = view.nodes.len(), total = full.nodes.len(), "Persisting graph beyond the view cap");
            view = Arc::new(full);
        }

        let record = SnapshotRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            version: view.version,
            nodes: view.nodes.clone(),
            edges: view.edges.clone(),
            layout_seed: view.layout_seed.clone(),
            positions: view.layout.positions.clone(),
        };
        let saved = self.history.save(&record).await?;
        info!(id = %saved.id, version = saved.version, nodes = saved.node_count, "Snapshot persisted");
        Ok(saved)
    }

    /// Persisted snapshots within `range`, oldest first.
    pub async fn snapshot_history(&self, range: TimeRange) -> Result<Vec<SnapshotRef>, ServiceError> {
        Ok(self.history.list(range).await?)
    }

    pub async fn load_snapshot(&self, id: Uuid) -> Result<SnapshotRecord, ServiceError> {
        Ok(self.history.load(id).await?)
    }

    /// Incremental changes published from now on. Empty when the service
    /// is not attached to a running engine.
    pub fn stream_graph_deltas(&self) -> BoxStream<'static, GraphDelta> {
        match &self.deltas {
            Some(tx) => BroadcastStream::new(tx.subscribe())
                .filter_map(|item| async move { item.ok() })
                .boxed(),
            None => stream::empty().boxed(),
        }
    }
}

struct ViewJob {
    snapshot: Arc<GraphSnapshot>,
    filter: GraphFilter,
    layout: LayoutEngine,
    seed: Option<LayoutSeed>,
    max_nodes: usize,
    cancel: CancellationToken,
}

impl ViewJob {
    fn run(self) -> Result<GraphView, ServiceError> {
        let mut projection = projection::project(&self.snapshot, &self.filter, &self.cancel)?;

        let total = projection.nodes.len();
        let truncated = total > self.max_nodes;
        if truncated {
            // Keep focus nodes, then the rest in id order.
            let (mut kept, rest): (Vec<Node>, Vec<Node>) =
                projection.nodes.into_iter().partition(|n| projection.exempt.contains(&n.id));
            let room = self.max_nodes.saturating_sub(kept.len());
            kept.extend(rest.into_iter().take(room));
            kept.sort_by(|a, b| a.id.cmp(&b.id));
            let ids: std::collections::BTreeSet<_> = kept.iter().map(|n| n.id.clone()).collect();
            projection.edges.retain(|e| ids.contains(&e.source) && ids.contains(&e.target));
            projection.nodes = kept;
        }
        if self.cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }

        let layout = self
            .layout
            .layout(&projection.nodes, &projection.edges, self.seed.clone());

        let mut validation = Validator::new()
            .exempting(projection.exempt.iter().cloned())
            .validate(&projection.nodes, &projection.edges);
        if truncated {
            validation.push(Violation {
                code: ViolationCode::NodeLimit,
                message: format!("view truncated to {} of {} nodes", self.max_nodes, total),
                node: None,
                edge: None,
            });
        }

        Ok(GraphView {
            version: self.snapshot.version(),
            filter: self.filter,
            nodes: projection.nodes,
            edges: projection.edges,
            layout_seed: layout.seed.clone(),
            layout,
            validation,
            truncated,
            generated_at: Utc::now(),
        })
    }
}
