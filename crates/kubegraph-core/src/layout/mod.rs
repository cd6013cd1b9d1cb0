//! Deterministic node placement.
//!
//! Every strategy is a pure function of the [`LayoutGraph`], the options and
//! a 64-bit seed. No wall-clock or unseeded randomness is involved, so an
//! unchanged graph laid out with the same seed yields bit-identical
//! positions. Layout never fails: empty graphs produce no positions and any
//! unusable output is replaced by a grid.

mod force;
mod graph;
mod grid;
mod layered;
mod seed;

pub use force::ForceLayout;
pub use graph::LayoutGraph;
pub use grid::GridLayout;
pub use layered::LayeredLayout;
pub use seed::LayoutSeed;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{ConfigError, LayoutConfig, DEFAULT_FORCE_NODE_LIMIT, DEFAULT_LAYOUT_ITERATIONS, DEFAULT_LAYOUT_SPACING};
use crate::model::{Edge, Node, NodeId};

/// Rendered node box width.
pub const NODE_WIDTH: f64 = 120.0;
/// Rendered node box height.
pub const NODE_HEIGHT: f64 = 40.0;
/// Horizontal pitch of the grid fallback.
pub const GRID_GAP_X: f64 = 180.0;
/// Vertical pitch of the grid fallback.
pub const GRID_GAP_Y: f64 = 60.0;
/// Vertical pitch between layers of the layered strategy.
pub const LAYER_GAP: f64 = NODE_HEIGHT + 80.0;

/// Top-left corner of a node box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Tuning shared by all strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    pub iterations: usize,
    pub spacing: f64,
    pub force_node_limit: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_LAYOUT_ITERATIONS,
            spacing: DEFAULT_LAYOUT_SPACING,
            force_node_limit: DEFAULT_FORCE_NODE_LIMIT,
        }
    }
}

/// A placement algorithm.
///
/// Returns one position per node of `graph`, in index order.
pub trait LayoutStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn place(&self, graph: &LayoutGraph, options: &LayoutOptions, rng_seed: u64) -> Vec<Position>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Force,
    Layered,
    Grid,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Force => "force",
            Self::Layered => "layered",
            Self::Grid => "grid",
        }
    }

    pub fn strategy(&self) -> Arc<dyn LayoutStrategy> {
        match self {
            Self::Force => Arc::new(ForceLayout),
            Self::Layered => Arc::new(LayeredLayout),
            Self::Grid => Arc::new(GridLayout),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "force" | "force-directed" => Ok(Self::Force),
            "layered" | "hierarchical" => Ok(Self::Layered),
            "grid" => Ok(Self::Grid),
            other => Err(format!("unknown layout strategy '{}'", other)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(min_x, min_y, max_x, max_y)` of the points, all zero when empty.
pub(crate) fn bounds(points: &[Position]) -> (f64, f64, f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }
    points.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(min_x, min_y, max_x, max_y), p| (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y)),
    )
}

/// Positions for one graph, with the seed and strategy that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub seed: LayoutSeed,
    pub strategy: StrategyKind,
    pub positions: BTreeMap<NodeId, Position>,
}

impl Layout {
    pub fn position(&self, id: &NodeId) -> Option<Position> {
        self.positions.get(id).copied()
    }

    /// Extent of all node boxes: `(width, height)`.
    pub fn extent(&self) -> (f64, f64) {
        if self.positions.is_empty() {
            return (0.0, 0.0);
        }
        let points: Vec<Position> = self.positions.values().copied().collect();
        let (min_x, min_y, max_x, max_y) = bounds(&points);
        (max_x - min_x + NODE_WIDTH, max_y - min_y + NODE_HEIGHT)
    }
}

/// Runs a strategy and enforces the output contract.
#[derive(Clone)]
pub struct LayoutEngine {
    kind: StrategyKind,
    strategy: Arc<dyn LayoutStrategy>,
    options: LayoutOptions,
}

impl fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("strategy", &self.strategy.name())
            .field("options", &self.options)
            .finish()
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(StrategyKind::default(), LayoutOptions::default())
    }
}

impl LayoutEngine {
    pub fn new(kind: StrategyKind, options: LayoutOptions) -> Self {
        Self {
            kind,
            strategy: kind.strategy(),
            options,
        }
    }

    pub fn from_config(config: &LayoutConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.strategy_kind()?, config.options()))
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    /// Lay out the given records. Edges with an endpoint outside `nodes` are
    /// ignored. Without an explicit seed one is derived from the id sets.
    pub fn layout<'a>(
        &self,
        nodes: impl IntoIterator<Item = &'a Node>,
        edges: impl IntoIterator<Item = &'a Edge>,
        seed: Option<LayoutSeed>,
    ) -> Layout {
        let graph = LayoutGraph::new(nodes, edges);
        let seed = seed.unwrap_or_else(|| LayoutSeed::from_ids(graph.ids.iter(), graph.edge_ids.iter()));

        let mut kind = self.kind;
        let mut placed = if graph.is_empty() {
            Vec::new()
        } else {
            self.strategy.place(&graph, &self.options, seed.rng_seed())
        };

        let usable = placed.len() == graph.len() && placed.iter().all(|p| p.x.is_finite() && p.y.is_finite());
        if !usable {
            tracing::warn!(
                strategy = self.strategy.name(),
                nodes = graph.len(),
                "layout produced unusable coordinates, falling back to grid"
            );
            kind = StrategyKind::Grid;
            placed = GridLayout.place(&graph, &self.options, 0);
        }

        let (min_x, min_y, _, _) = bounds(&placed);
        let positions = graph
            .ids
            .iter()
            .zip(placed)
            .map(|(id, p)| {
                let normalized = Position {
                    x: round(p.x - min_x),
                    y: round(p.y - min_y),
                };
                (id.clone(), normalized)
            })
            .collect();

        Layout {
            seed,
            strategy: kind,
            positions,
        }
    }
}

fn round(v: f64) -> f64 {
    let r = (v * 1000.0).round() / 1000.0;
    // Avoid serializing -0.
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HealthStatus, Relation, ResourceKind};

    fn node(kind: ResourceKind, name: &str) -> Node {
        let namespace = (!kind.is_cluster_scoped()).then(|| "default".to_string());
        Node {
            id: NodeId::new(kind, namespace.as_deref(), name),
            kind,
            name: name.to_string(),
            namespace,
            uid: None,
            status: HealthStatus::Unknown,
            revision: 1,
            attributes: BTreeMap::new(),
        }
    }

    fn sample() -> (Vec<Node>, Vec<Edge>) {
        let ns = node(ResourceKind::Namespace, "default");
        let deploy = node(ResourceKind::Deployment, "web");
        let pods: Vec<Node> = (0..4).map(|i| node(ResourceKind::Pod, &format!("web-{}", i))).collect();
        let lonely = node(ResourceKind::StorageClass, "standard");

        let mut edges = Vec::new();
        for pod in &pods {
            edges.push(Edge::new(deploy.id.clone(), pod.id.clone(), Relation::Ownership));
            edges.push(Edge::new(ns.id.clone(), pod.id.clone(), Relation::NamespaceContainment));
        }
        edges.push(Edge::new(ns.id.clone(), deploy.id.clone(), Relation::NamespaceContainment));

        let mut nodes = vec![ns, deploy, lonely];
        nodes.extend(pods);
        (nodes, edges)
    }

    #[test]
    fn test_strategies_are_deterministic() {
        let (nodes, edges) = sample();
        for kind in [StrategyKind::Force, StrategyKind::Layered, StrategyKind::Grid] {
            let engine = LayoutEngine::new(kind, LayoutOptions::default());
            let a = engine.layout(&nodes, &edges, None);
            let mut reversed = nodes.clone();
            reversed.reverse();
            let b = engine.layout(&reversed, &edges, None);
            assert_eq!(a, b, "{} differs", kind);
            assert_eq!(a.positions.len(), nodes.len());
            assert!(a.positions.values().all(|p| p.x >= 0.0 && p.y >= 0.0));
        }
    }

    #[test]
    fn test_seed_changes_force_layout() {
        let (nodes, edges) = sample();
        let engine = LayoutEngine::new(StrategyKind::Force, LayoutOptions::default());
        let a = engine.layout(&nodes, &edges, Some(LayoutSeed::from_u64(1)));
        let b = engine.layout(&nodes, &edges, Some(LayoutSeed::from_u64(2)));
        assert_eq!(a.seed, LayoutSeed::from_u64(1));
        assert_ne!(a.positions, b.positions);
    }

    #[test]
    fn test_empty_graph() {
        let layout = LayoutEngine::default().layout(std::iter::empty(), std::iter::empty(), None);
        assert!(layout.positions.is_empty());
        assert_eq!(layout.extent(), (0.0, 0.0));
    }

    #[test]
    fn test_layered_puts_owner_above() {
        let (nodes, edges) = sample();
        let engine = LayoutEngine::new(StrategyKind::Layered, LayoutOptions::default());
        let layout = engine.layout(&nodes, &edges, None);
        let deploy = layout.position(&NodeId::new(ResourceKind::Deployment, Some("default"), "web")).unwrap();
        let pod = layout.position(&NodeId::new(ResourceKind::Pod, Some("default"), "web-0")).unwrap();
        assert!(deploy.y < pod.y);
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("Hierarchical".parse::<StrategyKind>().unwrap(), StrategyKind::Layered);
        assert!("spiral".parse::<StrategyKind>().is_err());
    }
}
