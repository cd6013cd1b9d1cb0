use serde::Serialize;

use super::{ExportError, Scene};
use crate::layout::{LayoutSeed, Position, StrategyKind};
use crate::model::{Edge, Node};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Document<'a> {
    layout_seed: &'a LayoutSeed,
    strategy: StrategyKind,
    nodes: Vec<PlacedNode<'a>>,
    edges: &'a [Edge],
}

#[derive(Serialize)]
struct PlacedNode<'a> {
    #[serde(flatten)]
    node: &'a Node,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<Position>,
}

pub(super) fn render(scene: &Scene<'_>) -> Result<Vec<u8>, ExportError> {
    let document = Document {
        layout_seed: &scene.layout.seed,
        strategy: scene.layout.strategy,
        nodes: scene
            .nodes
            .iter()
            .map(|node| PlacedNode {
                node,
                position: scene.layout.position(&node.id),
            })
            .collect(),
        edges: scene.edges,
    };
    Ok(serde_json::to_vec_pretty(&document)?)
}
