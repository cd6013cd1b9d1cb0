mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kubegraph_core::config::EngineConfig;
use kubegraph_core::event::WatchRecord;
use kubegraph_core::history::FileSnapshotStore;
use kubegraph_core::{Config, NodeId, ResourceKind, TopologyEngine, TopologyService};
use serde_json::json;
use tempfile::TempDir;

#[tokio::test]
async fn test_engine_builds_shop_graph() {
    let engine = TopologyEngine::spawn(&EngineConfig::default());
    for event in common::shop_events() {
        engine.submit(event).await.unwrap();
    }
    for kind in ResourceKind::ALL {
        engine.sync_complete(kind).await.unwrap();
    }
    let version = engine.flush().await.unwrap();

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.version(), version);
    assert_eq!(snapshot.node_count(), 9);
    assert_eq!(snapshot.edge_count(), 24);

    let stats = engine.stats();
    assert_eq!(stats.synced_kinds, ResourceKind::ALL.len());
    assert_eq!(stats.builder.events_applied, 9);
    assert_eq!(stats.builder.pending_edges, 0);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_per_kind_sources_share_one_writer() {
    let config = EngineConfig {
        max_batch: 2,
        ..EngineConfig::default()
    };
    let engine = TopologyEngine::spawn(&config);
    let pods = engine.source(ResourceKind::Pod);
    let namespaces = engine.source(ResourceKind::Namespace);

    // The pod arrives before its namespace; the edge waits until it exists.
    pods.add(json!({"metadata": {"name": "p", "namespace": "late"}})).await.unwrap();
    namespaces.add(json!({"metadata": {"name": "late"}})).await.unwrap();
    engine.flush().await.unwrap();
    assert_eq!(engine.snapshot().edge_count(), 1);

    pods.delete(json!({"metadata": {"name": "p", "namespace": "late"}})).await.unwrap();
    engine.flush().await.unwrap();
    let snapshot = engine.snapshot();
    assert!(!snapshot.contains_node(&NodeId::from_raw("pod/late/p")));
    assert_eq!(snapshot.edge_count(), 0);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_readers_keep_their_snapshot() {
    let engine = TopologyEngine::spawn(&EngineConfig::default());
    let namespaces = engine.source(ResourceKind::Namespace);
    namespaces.add(json!({"metadata": {"name": "a"}})).await.unwrap();
    engine.flush().await.unwrap();
    let held = engine.snapshot();

    namespaces.add(json!({"metadata": {"name": "b"}})).await.unwrap();
    engine.flush().await.unwrap();

    assert_eq!(held.node_count(), 1);
    assert_eq!(engine.snapshot().node_count(), 2);
    assert!(engine.snapshot().version() > held.version());
    engine.shutdown().await;
}

#[tokio::test]
async fn test_rejected_events_do_not_stop_the_writer() {
    let engine = TopologyEngine::spawn(&EngineConfig::default());
    let pods = engine.source(ResourceKind::Pod);
    pods.add(json!({"metadata": {"namespace": "x"}})).await.unwrap();
    pods.add(json!({"metadata": {"name": "ok", "namespace": "x"}})).await.unwrap();
    engine.flush().await.unwrap();

    let stats = engine.stats();
    assert_eq!(stats.builder.objects_rejected, 1);
    assert_eq!(stats.nodes, 1);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_deltas_are_streamed() {
    let engine = TopologyEngine::spawn(&EngineConfig::default());
    let mut deltas = Box::pin(engine.subscribe_deltas());

    engine
        .submit_record(WatchRecord::Event(kubegraph_core::WatchEvent::add(
            ResourceKind::Namespace,
            json!({"metadata": {"name": "shop"}}),
        )))
        .await
        .unwrap();
    engine.flush().await.unwrap();

    let delta = tokio::time::timeout(Duration::from_secs(5), deltas.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delta.added_nodes.len(), 1);
    assert_eq!(delta.added_nodes[0].id, NodeId::from_raw("namespace/shop"));
    assert_eq!(delta.version, engine.snapshot().version());
    engine.shutdown().await;
}

#[tokio::test]
async fn test_service_follows_engine() {
    let temp_dir = TempDir::new().unwrap();
    let engine = TopologyEngine::spawn(&EngineConfig::default());
    let history = Arc::new(FileSnapshotStore::new(temp_dir.path(), 10));
    let service = TopologyService::new(&engine, history, &Config::default()).unwrap();
    let mut deltas = service.stream_graph_deltas();

    for event in common::shop_events() {
        engine.submit(event).await.unwrap();
    }
    let version = engine.flush().await.unwrap();

    assert_eq!(service.current_snapshot().version(), version);
    let delta = tokio::time::timeout(Duration::from_secs(5), deltas.next())
        .await
        .unwrap()
        .unwrap();
    assert!(!delta.added_nodes.is_empty());
    engine.shutdown().await;
}
