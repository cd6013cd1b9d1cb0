mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use kubegraph_core::history::{FileSnapshotStore, SnapshotRecord, SnapshotStore, StorageError, TimeRange};
use kubegraph_core::{Config, GraphFilter, LayoutSeed, TopologyService};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn create_test_store(max_snapshots: usize) -> (FileSnapshotStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSnapshotStore::new(temp_dir.path().join("snapshots"), max_snapshots);
    (store, temp_dir)
}

fn record(at: DateTime<Utc>, version: u64) -> SnapshotRecord {
    let records = common::shop_builder().snapshot().to_records();
    SnapshotRecord {
        id: Uuid::new_v4(),
        timestamp: at,
        version,
        nodes: records.nodes,
        edges: records.edges,
        layout_seed: LayoutSeed::from_u64(version),
        positions: BTreeMap::new(),
    }
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn test_save_and_load_snapshot() {
    let (store, _temp) = create_test_store(10);
    let saved = record(noon(), 7);

    let reference = store.save(&saved).await.unwrap();
    assert_eq!(reference.id, saved.id);
    assert_eq!(reference.node_count, 9);
    assert_eq!(reference.edge_count, 24);

    let loaded = store.load(saved.id).await.unwrap();
    assert_eq!(loaded, saved);
}

#[tokio::test]
async fn test_list_snapshots_in_range() {
    let (store, _temp) = create_test_store(10);
    for hour in [2, 0, 1] {
        store.save(&record(noon() + Duration::hours(hour), hour as u64)).await.unwrap();
    }

    let all = store.list(TimeRange::all()).await.unwrap();
    let versions: Vec<u64> = all.iter().map(|r| r.version).collect();
    assert_eq!(versions, vec![0, 1, 2]);

    let window = TimeRange::between(noon() + Duration::minutes(30), noon() + Duration::hours(2));
    let versions: Vec<u64> = store.list(window).await.unwrap().iter().map(|r| r.version).collect();
    assert_eq!(versions, vec![1, 2]);
}

#[tokio::test]
async fn test_oldest_snapshots_are_pruned() {
    let (store, _temp) = create_test_store(2);
    let first = record(noon(), 1);
    store.save(&first).await.unwrap();
    store.save(&record(noon() + Duration::hours(1), 2)).await.unwrap();
    store.save(&record(noon() + Duration::hours(2), 3)).await.unwrap();

    let remaining = store.list(TimeRange::all()).await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].version, 2);

    let err = store.load(first.id).await.unwrap_err();
    assert!(matches!(err, StorageError::SnapshotNotFound(id) if id == first.id));
}

#[tokio::test]
async fn test_unreadable_files_are_skipped() {
    let (store, _temp) = create_test_store(10);
    store.save(&record(noon(), 1)).await.unwrap();
    std::fs::write(store.dir().join("broken.json"), "{ not json").unwrap();
    std::fs::write(store.dir().join("notes.txt"), "ignored").unwrap();

    let listed = store.list(TimeRange::all()).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_empty_store_lists_nothing() {
    let (store, _temp) = create_test_store(10);
    assert!(store.list(TimeRange::all()).await.unwrap().is_empty());
    assert!(matches!(
        store.load(Uuid::new_v4()).await,
        Err(StorageError::SnapshotNotFound(_))
    ));
}

#[tokio::test]
async fn test_service_persists_current_graph() {
    let (store, _temp) = create_test_store(10);
    let history: Arc<dyn SnapshotStore> = Arc::new(store);
    let snapshot = common::shop_builder().snapshot();
    let version = snapshot.version();
    let service = TopologyService::from_snapshot(snapshot, history, &Config::default()).unwrap();

    let saved = service.persist_snapshot().await.unwrap();
    assert_eq!(saved.version, version);

    let listed = service.snapshot_history(TimeRange::all()).await.unwrap();
    assert_eq!(listed, vec![saved.clone()]);

    // The stored layout is the one the live view shows.
    let record = service.load_snapshot(saved.id).await.unwrap();
    let view = service.get_current_graph(&GraphFilter::all(), &CancellationToken::new()).await.unwrap();
    assert_eq!(record.positions, view.layout.positions);
    assert_eq!(record.layout_seed, view.layout_seed);
    assert_eq!(record.nodes, view.nodes);
}

#[tokio::test]
async fn test_persisted_graph_ignores_view_cap() {
    let (store, _temp) = create_test_store(10);
    let history: Arc<dyn SnapshotStore> = Arc::new(store);
    let mut config = Config::default();
    config.export.max_nodes = 3;
    let snapshot = common::shop_builder().snapshot();
    let total_nodes = snapshot.node_count();
    let total_edges = snapshot.edge_count();
    let service = TopologyService::from_snapshot(snapshot, history, &config).unwrap();

    let view = service.get_current_graph(&GraphFilter::all(), &CancellationToken::new()).await.unwrap();
    assert!(view.truncated);
    assert_eq!(view.nodes.len(), 3);

    let saved = service.persist_snapshot().await.unwrap();
    assert_eq!(saved.node_count, total_nodes);
    assert_eq!(saved.edge_count, total_edges);

    let record = service.load_snapshot(saved.id).await.unwrap();
    assert_eq!(record.nodes.len(), total_nodes);
    assert!(record.nodes.iter().all(|n| record.positions.contains_key(&n.id)));
}

#[tokio::test]
async fn test_listing_reads_only_refs() {
    let (store, _temp) = create_test_store(10);
    let saved = record(noon(), 1);
    let reference = store.save(&saved).await.unwrap();
    assert!(store.dir().join(format!("{}.ref.json", saved.id)).exists());

    // A listing does not touch the full record.
    std::fs::write(store.dir().join(format!("{}.json", saved.id)), "{ not json").unwrap();
    let listed = store.list(TimeRange::all()).await.unwrap();
    assert_eq!(listed, vec![reference]);
    assert!(matches!(store.load(saved.id).await, Err(StorageError::Json(_))));
}

#[tokio::test]
async fn test_record_without_ref_is_still_listed() {
    let (store, _temp) = create_test_store(2);
    let first = record(noon(), 1);
    store.save(&first).await.unwrap();
    std::fs::remove_file(store.dir().join(format!("{}.ref.json", first.id))).unwrap();

    let listed = store.list(TimeRange::all()).await.unwrap();
    assert_eq!(listed, vec![first.to_ref()]);

    // Pruning still finds it as the oldest.
    store.save(&record(noon() + Duration::hours(1), 2)).await.unwrap();
    store.save(&record(noon() + Duration::hours(2), 3)).await.unwrap();
    let versions: Vec<u64> = store.list(TimeRange::all()).await.unwrap().iter().map(|r| r.version).collect();
    assert_eq!(versions, vec![2, 3]);
    assert!(!store.dir().join(format!("{}.json", first.id)).exists());
}
