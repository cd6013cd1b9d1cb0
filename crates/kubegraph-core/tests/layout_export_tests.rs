mod common;

use std::sync::Arc;

use kubegraph_core::config::ExportConfig;
use kubegraph_core::history::FileSnapshotStore;
use kubegraph_core::layout::{Position, StrategyKind};
use kubegraph_core::projection::{self, Depth, Direction};
use kubegraph_core::service::{ServiceError, VIEW_CACHE_CAPACITY};
use kubegraph_core::validate::ViolationCode;
use kubegraph_core::{Config, ExportFormat, GraphFilter, LayoutEngine, NodeId, TopologyService, Validator};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn create_test_service(config: &Config) -> (TopologyService, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let history = Arc::new(FileSnapshotStore::new(temp_dir.path().join("snapshots"), 10));
    let service = TopologyService::from_snapshot(common::shop_builder().snapshot(), history, config).unwrap();
    (service, temp_dir)
}

#[test]
fn test_layout_is_bit_identical() {
    let snapshot = common::shop_builder().snapshot();
    let records = snapshot.to_records();

    for kind in [StrategyKind::Force, StrategyKind::Layered, StrategyKind::Grid] {
        let engine = LayoutEngine::new(kind, Default::default());
        let first = engine.layout(&records.nodes, &records.edges, None);
        let second = engine.layout(records.nodes.iter().rev(), records.edges.iter().rev(), None);

        assert_eq!(first.positions.len(), 9);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap(),
            "{} layout differs between runs",
            kind
        );
    }
}

#[test]
fn test_ego_network_is_closed() {
    let snapshot = common::shop_builder().snapshot();
    let cancel = CancellationToken::new();
    let ids: Vec<NodeId> = snapshot.nodes().map(|n| n.id.clone()).collect();

    for focus in &ids {
        for depth in 0..4 {
            let ego = projection::ego_network(&snapshot, focus, Depth::Bounded(depth), Direction::Both, &cancel).unwrap();

            assert_eq!(ego.hops.get(focus), Some(&0));
            assert!(ego.hops.values().all(|h| *h <= depth));
            assert_eq!(ego.nodes.len(), ego.hops.len());
            for edge in &ego.edges {
                assert!(ego.contains(&edge.source) && ego.contains(&edge.target), "{}", edge.id);
            }

            let report = Validator::new()
                .exempting([focus.clone()])
                .validate(&ego.nodes, &ego.edges);
            assert!(report.is_complete(), "{} depth {}: {:?}", focus, depth, report.violations);
        }
    }
}

#[test]
fn test_unbounded_ego_reaches_everything() {
    let snapshot = common::shop_builder().snapshot();
    let ego = projection::ego_network(
        &snapshot,
        &NodeId::from_raw("configmap/shop/web-config"),
        Depth::Unbounded,
        Direction::Both,
        &CancellationToken::new(),
    )
    .unwrap();
    assert_eq!(ego.nodes.len(), snapshot.node_count());
    assert_eq!(ego.edges.len(), snapshot.edge_count());

    let outgoing = projection::ego_network(
        &snapshot,
        &NodeId::from_raw("configmap/shop/web-config"),
        Depth::Unbounded,
        Direction::Outgoing,
        &CancellationToken::new(),
    )
    .unwrap();
    assert_eq!(outgoing.nodes.len(), 1);
}

#[tokio::test]
async fn test_export_matches_displayed_view() {
    let (service, _temp) = create_test_service(&Config::default());
    let filter = GraphFilter::all().namespace("shop");
    let cancel = CancellationToken::new();

    let view = service.get_current_graph(&filter, &cancel).await.unwrap();
    assert_eq!(view.nodes.len(), 9);
    assert!(view.validation.is_complete());

    let json = service.render_export(ExportFormat::Json, &filter, &cancel).await.unwrap();
    let document: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(document["layoutSeed"].as_str(), Some(view.layout_seed.as_str()));

    let exported = document["nodes"].as_array().unwrap();
    assert_eq!(exported.len(), view.nodes.len());
    for node in exported {
        let id = NodeId::from_raw(node["id"].as_str().unwrap());
        let position: Position = serde_json::from_value(node["position"].clone()).unwrap();
        assert_eq!(Some(position), view.layout.position(&id), "{}", id);
    }
    assert_eq!(document["edges"].as_array().unwrap().len(), view.edges.len());

    // The view is computed once per version and filter.
    let again = service.get_current_graph(&filter, &cancel).await.unwrap();
    assert!(Arc::ptr_eq(&view, &again));

    let svg = service.render_export(ExportFormat::Svg, &filter, &cancel).await.unwrap();
    let svg_again = service.render_export(ExportFormat::Svg, &filter, &cancel).await.unwrap();
    assert_eq!(svg, svg_again);
    let text = String::from_utf8(svg).unwrap();
    assert!(text.starts_with("<svg"));
    assert!(text.contains("data-id=\"pod/shop/web-6d4f-a\""));
}

#[tokio::test]
async fn test_every_format_renders() {
    let (service, _temp) = create_test_service(&Config::default());
    let filter = GraphFilter::all();
    let cancel = CancellationToken::new();

    let png = service.render_export(ExportFormat::Png, &filter, &cancel).await.unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

    let pdf = service.render_export(ExportFormat::Pdf, &filter, &cancel).await.unwrap();
    assert!(pdf.starts_with(b"%PDF-1.4"));
    assert!(pdf.ends_with(b"%%EOF\n"));

    let drawio = service.render_export(ExportFormat::Drawio, &filter, &cancel).await.unwrap();
    let drawio = String::from_utf8(drawio).unwrap();
    assert!(drawio.contains("<mxfile host=\"app.diagrams.net\""));
    assert!(drawio.contains("Deployment: web"));
}

#[tokio::test]
async fn test_focus_view() {
    let (service, _temp) = create_test_service(&Config::default());
    let focus = NodeId::from_raw("pod/shop/web-6d4f-a");
    let filter = GraphFilter::all().focus(focus.clone(), Depth::Bounded(1), Direction::Both);

    let view = service.get_current_graph(&filter, &CancellationToken::new()).await.unwrap();
    let ids: Vec<&str> = view.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "configmap/shop/web-config",
            "deployment/shop/web",
            "namespace/shop",
            "pod/shop/web-6d4f-a",
            "replicaset/shop/web-6d4f",
            "service/shop/web",
            "serviceaccount/shop/web",
        ]
    );
    assert!(!ids.contains(&"pod/shop/web-6d4f-b"));
    assert!(view.validation.is_complete());

    let missing = GraphFilter::all().focus(NodeId::from_raw("pod/shop/ghost"), Depth::Bounded(1), Direction::Both);
    let err = service.get_current_graph(&missing, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Projection(_)));
}

#[tokio::test]
async fn test_node_cap_truncates_view() {
    let config = Config {
        export: ExportConfig {
            max_nodes: 3,
            ..ExportConfig::default()
        },
        ..Config::default()
    };
    let (service, _temp) = create_test_service(&config);
    let focus = NodeId::from_raw("service/shop/web");
    let filter = GraphFilter::all().focus(focus.clone(), Depth::Unbounded, Direction::Both);

    let view = service.get_current_graph(&filter, &CancellationToken::new()).await.unwrap();
    assert!(view.truncated);
    assert_eq!(view.nodes.len(), 3);
    assert!(view.nodes.iter().any(|n| n.id == focus));
    assert_eq!(view.layout.positions.len(), 3);
    assert_eq!(view.validation.count(ViolationCode::NodeLimit), 1);
    assert!(!view.validation.is_complete());
}

#[tokio::test]
async fn test_cancelled_request_returns_nothing() {
    let (service, _temp) = create_test_service(&Config::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = service.get_current_graph(&GraphFilter::all(), &cancel).await.unwrap_err();
    assert!(matches!(err, ServiceError::Cancelled));

    // A later request computes the view from scratch.
    let view = service.get_current_graph(&GraphFilter::all(), &CancellationToken::new()).await.unwrap();
    assert_eq!(view.nodes.len(), 9);
}

#[tokio::test]
async fn test_view_cache_is_bounded() {
    let (service, _temp) = create_test_service(&Config::default());
    let cancel = CancellationToken::new();
    let shop = GraphFilter::all().namespace("shop");
    let first = service.get_current_graph(&shop, &cancel).await.unwrap();

    for i in 0..VIEW_CACHE_CAPACITY * 2 {
        let filter = GraphFilter::all().namespace(format!("scratch-{}", i));
        service.get_current_graph(&filter, &cancel).await.unwrap();
        assert!(service.cached_views() <= VIEW_CACHE_CAPACITY);
    }
    assert_eq!(service.cached_views(), VIEW_CACHE_CAPACITY);

    // The evicted view is recomputed to the same content.
    let again = service.get_current_graph(&shop, &cancel).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &again));
    assert_eq!(first.nodes, again.nodes);
    assert_eq!(first.layout.positions, again.layout.positions);
}
