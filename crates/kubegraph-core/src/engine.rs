//! Single-writer runtime around the [`TopologyBuilder`].
//!
//! Per-kind producers push into one bounded intake queue. A single tokio
//! task owns the builder, applies queued messages in arrival order, and
//! after each batch publishes an immutable [`GraphSnapshot`] through a
//! `watch` channel and the batch's [`GraphDelta`] through a `broadcast`
//! channel. Readers clone an `Arc` and never wait on the writer.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::builder::{BuilderStats, TopologyBuilder};
use crate::config::EngineConfig;
use crate::event::{Action, WatchEvent, WatchRecord};
use crate::model::ResourceKind;
use crate::rules::RuleRegistry;
use crate::store::{GraphDelta, GraphSnapshot};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Topology engine has shut down")]
    Closed,
}

enum Intake {
    Event(WatchEvent),
    Synced(ResourceKind),
    Flush(oneshot::Sender<u64>),
}

/// Counters published after every batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub version: u64,
    pub nodes: usize,
    pub edges: usize,
    pub batches: u64,
    pub synced_kinds: usize,
    #[serde(flatten)]
    pub builder: BuilderStats,
}

/// Producer handle for one resource kind.
#[derive(Clone)]
pub struct KindSource {
    kind: ResourceKind,
    tx: mpsc::Sender<Intake>,
}

impl KindSource {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Queue an event, waiting while the intake queue is full.
    pub async fn send(&self, action: Action, object: serde_json::Value) -> Result<(), EngineError> {
        let event = WatchEvent::new(self.kind, action, object);
        self.tx.send(Intake::Event(event)).await.map_err(|_| EngineError::Closed)
    }

    pub async fn add(&self, object: serde_json::Value) -> Result<(), EngineError> {
        self.send(Action::Add, object).await
    }

    pub async fn update(&self, object: serde_json::Value) -> Result<(), EngineError> {
        self.send(Action::Update, object).await
    }

    pub async fn delete(&self, object: serde_json::Value) -> Result<(), EngineError> {
        self.send(Action::Delete, object).await
    }

    /// Mark the initial listing of this kind as complete.
    pub async fn sync_complete(&self) -> Result<(), EngineError> {
        self.tx.send(Intake::Synced(self.kind)).await.map_err(|_| EngineError::Closed)
    }
}

/// Handle to the running writer task.
pub struct TopologyEngine {
    tx: mpsc::Sender<Intake>,
    snapshots: watch::Receiver<Arc<GraphSnapshot>>,
    stats: watch::Receiver<EngineStats>,
    deltas: broadcast::Sender<GraphDelta>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl TopologyEngine {
    /// Start the writer with the default rule registry. Must be called
    /// inside a tokio runtime.
    pub fn spawn(config: &EngineConfig) -> Self {
        Self::spawn_with(config, TopologyBuilder::with_rules(RuleRegistry::new()))
    }

    /// Start the writer around an existing builder.
    pub fn spawn_with(config: &EngineConfig, builder: TopologyBuilder) -> Self {
        let (tx, rx) = mpsc::channel(config.intake_capacity.max(1));
        let (snapshot_tx, snapshots) = watch::channel(Arc::new(builder.snapshot()));
        let (stats_tx, stats) = watch::channel(EngineStats::default());
        let (deltas, _) = broadcast::channel(config.delta_capacity.max(1));
        let shutdown = CancellationToken::new();

        let writer = Writer {
            builder,
            config: config.clone(),
            snapshot_tx,
            stats_tx,
            deltas: deltas.clone(),
            batches: 0,
        };
        let task = tokio::spawn(writer.run(rx, shutdown.clone()));
        info!(
            intake_capacity = config.intake_capacity,
            max_batch = config.max_batch,
            "Topology engine started"
        );

        Self {
            tx,
            snapshots,
            stats,
            deltas,
            shutdown,
            task,
        }
    }

    /// Producer handle for `kind`.
    pub fn source(&self, kind: ResourceKind) -> KindSource {
        KindSource {
            kind,
            tx: self.tx.clone(),
        }
    }

    pub async fn submit(&self, event: WatchEvent) -> Result<(), EngineError> {
        self.tx.send(Intake::Event(event)).await.map_err(|_| EngineError::Closed)
    }

    /// Queue a recorded event or sync marker.
    pub async fn submit_record(&self, record: WatchRecord) -> Result<(), EngineError> {
        let msg = match record {
            WatchRecord::Event(event) => Intake::Event(event),
            WatchRecord::Sync { kind } => Intake::Synced(kind),
        };
        self.tx.send(msg).await.map_err(|_| EngineError::Closed)
    }

    pub async fn sync_complete(&self, kind: ResourceKind) -> Result<(), EngineError> {
        self.tx.send(Intake::Synced(kind)).await.map_err(|_| EngineError::Closed)
    }

    /// Wait until everything queued before this call is applied and
    /// published. Returns the published version.
    pub async fn flush(&self) -> Result<u64, EngineError> {
        let (done, wait) = oneshot::channel();
        self.tx.send(Intake::Flush(done)).await.map_err(|_| EngineError::Closed)?;
        wait.await.map_err(|_| EngineError::Closed)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn watch_snapshots(&self) -> watch::Receiver<Arc<GraphSnapshot>> {
        self.snapshots.clone()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.borrow().clone()
    }

    /// Raw delta receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GraphDelta> {
        self.deltas.subscribe()
    }

    pub(crate) fn delta_sender(&self) -> broadcast::Sender<GraphDelta> {
        self.deltas.clone()
    }

    /// Deltas published from now on. A subscriber that falls behind skips
    /// the lost deltas and should re-fetch the full graph.
    pub fn subscribe_deltas(&self) -> impl Stream<Item = GraphDelta> + Send + 'static {
        BroadcastStream::new(self.deltas.subscribe()).filter_map(|item| async move {
            match item {
                Ok(delta) => Some(delta),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Delta subscriber lagged");
                    None
                }
            }
        })
    }

    /// Stop the writer after the message it is working on.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(err) = self.task.await {
            warn!(error = %err, "Topology writer task failed");
        }
    }
}

struct Writer {
    builder: TopologyBuilder,
    config: EngineConfig,
    snapshot_tx: watch::Sender<Arc<GraphSnapshot>>,
    stats_tx: watch::Sender<EngineStats>,
    deltas: broadcast::Sender<GraphDelta>,
    batches: u64,
}

impl Writer {
    async fn run(mut self, mut rx: mpsc::Receiver<Intake>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.expiry_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    let mut flushes = Vec::new();
                    self.handle(msg, &mut flushes);
                    let mut drained = 1;
                    while drained < self.config.max_batch {
                        match rx.try_recv() {
                            Ok(msg) => self.handle(msg, &mut flushes),
                            Err(_) => break,
                        }
                        drained += 1;
                    }
                    let version = self.publish();
                    for done in flushes {
                        let _ = done.send(version);
                    }
                }
                _ = ticker.tick() => {
                    let expired = self.builder.expire_pending(Instant::now(), self.config.pending_horizon());
                    if !expired.is_empty() {
                        self.publish();
                    }
                }
            }
        }
        info!(version = self.builder.store().version(), "Topology engine stopped");
    }

    fn handle(&mut self, msg: Intake, flushes: &mut Vec<oneshot::Sender<u64>>) {
        match msg {
            // Rejections are logged and counted by the builder.
            Intake::Event(event) => {
                let _ = self.builder.apply(&event);
            }
            Intake::Synced(kind) => self.builder.mark_synced(kind),
            Intake::Flush(done) => flushes.push(done),
        }
    }

    /// Publish the current state when it changed. Returns the store version.
    fn publish(&mut self) -> u64 {
        let version = self.builder.store().version();
        if self.builder.store().has_changes() {
            let delta = self.builder.take_delta();
            self.snapshot_tx.send_replace(Arc::new(self.builder.snapshot()));
            self.batches += 1;
            if !delta.is_empty() {
                // No subscribers is fine.
                let _ = self.deltas.send(delta);
            }
            debug!(version, batch = self.batches, "Published snapshot");
        }

        let store = self.builder.store();
        self.stats_tx.send_replace(EngineStats {
            version,
            nodes: store.node_count(),
            edges: store.edge_count(),
            batches: self.batches,
            synced_kinds: ResourceKind::ALL.iter().filter(|k| self.builder.is_synced(**k)).count(),
            builder: self.builder.stats(),
        });
        version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_flush_publishes_snapshot() {
        let engine = TopologyEngine::spawn(&EngineConfig::default());
        let pods = engine.source(ResourceKind::Pod);
        pods.add(json!({"metadata": {"name": "p", "namespace": "default"}})).await.unwrap();
        let version = engine.flush().await.unwrap();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.version(), version);
        assert_eq!(snapshot.node_count(), 1);
        assert_eq!(engine.stats().builder.events_applied, 1);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_closed_after_shutdown() {
        let engine = TopologyEngine::spawn(&EngineConfig::default());
        let source = engine.source(ResourceKind::Pod);
        engine.shutdown().await;
        assert_eq!(source.sync_complete().await, Err(EngineError::Closed));
    }
}
