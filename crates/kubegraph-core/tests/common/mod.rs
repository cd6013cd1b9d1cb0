#![allow(dead_code)]

use kubegraph_core::{ResourceKind, TopologyBuilder, WatchEvent};
use serde_json::{json, Value};

pub fn pod(name: &str, owner_rs: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "metadata": {
            "name": name,
            "namespace": "shop",
            "labels": {"app": "web", "tier": "frontend"},
            "ownerReferences": [{"kind": "ReplicaSet", "name": owner_rs, "controller": true}]
        },
        "spec": {
            "serviceAccountName": "web",
            "volumes": [{"name": "config", "configMap": {"name": "web-config"}}],
            "containers": [{
                "name": "web",
                "image": "nginx:1.27",
                "ports": [{"name": "http", "containerPort": 8080}]
            }]
        },
        "status": {"phase": "Running"}
    })
}

/// A small but complete namespace: deployment, replica set, two pods,
/// service, ingress, config map and service account.
pub fn shop_events() -> Vec<WatchEvent> {
    vec![
        WatchEvent::add(ResourceKind::Namespace, json!({"metadata": {"name": "shop"}})),
        WatchEvent::add(
            ResourceKind::ServiceAccount,
            json!({"metadata": {"name": "web", "namespace": "shop"}}),
        ),
        WatchEvent::add(
            ResourceKind::ConfigMap,
            json!({"metadata": {"name": "web-config", "namespace": "shop"}, "data": {"mode": "prod"}}),
        ),
        WatchEvent::add(
            ResourceKind::Deployment,
            json!({
                "metadata": {"name": "web", "namespace": "shop", "uid": "d-1"},
                "spec": {"replicas": 2, "selector": {"matchLabels": {"app": "web"}}},
                "status": {"readyReplicas": 2}
            }),
        ),
        WatchEvent::add(
            ResourceKind::ReplicaSet,
            json!({
                "metadata": {
                    "name": "web-6d4f",
                    "namespace": "shop",
                    "ownerReferences": [{"kind": "Deployment", "name": "web", "controller": true}]
                },
                "spec": {"replicas": 2, "selector": {"matchLabels": {"app": "web"}}},
                "status": {"readyReplicas": 2}
            }),
        ),
        WatchEvent::add(ResourceKind::Pod, pod("web-6d4f-a", "web-6d4f")),
        WatchEvent::add(ResourceKind::Pod, pod("web-6d4f-b", "web-6d4f")),
        WatchEvent::add(
            ResourceKind::Service,
            json!({
                "metadata": {"name": "web", "namespace": "shop"},
                "spec": {"selector": {"app": "web"}, "ports": [{"port": 80, "targetPort": 8080}]}
            }),
        ),
        WatchEvent::add(
            ResourceKind::Ingress,
            json!({
                "metadata": {"name": "web", "namespace": "shop"},
                "spec": {"rules": [{"http": {"paths": [{"path": "/", "backend": {"service": {"name": "web", "port": {"number": 80}}}}]}}]}
            }),
        ),
    ]
}

/// Builder with the shop namespace applied and every kind marked synced.
pub fn shop_builder() -> TopologyBuilder {
    let mut builder = TopologyBuilder::new();
    for event in shop_events() {
        builder.apply(&event).unwrap();
    }
    for kind in ResourceKind::ALL {
        builder.mark_synced(kind);
    }
    builder
}
