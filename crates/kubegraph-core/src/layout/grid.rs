use super::graph::LayoutGraph;
use super::{LayoutOptions, LayoutStrategy, Position, GRID_GAP_X, GRID_GAP_Y};

/// Row-major grid in node id order, roughly square.
///
/// Used directly for degenerate inputs and as the fallback whenever another
/// strategy produces unusable coordinates.
#[derive(Debug, Default)]
pub struct GridLayout;

impl GridLayout {
    pub(crate) fn place_subset(members: &[usize], _options: &LayoutOptions) -> Vec<Position> {
        let cols = ((members.len() as f64).sqrt().ceil() as usize).max(1);
        (0..members.len())
            .map(|i| Position {
                x: (i % cols) as f64 * GRID_GAP_X,
                y: (i / cols) as f64 * GRID_GAP_Y,
            })
            .collect()
    }
}

impl LayoutStrategy for GridLayout {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn place(&self, graph: &LayoutGraph, options: &LayoutOptions, _rng_seed: u64) -> Vec<Position> {
        let all: Vec<usize> = (0..graph.len()).collect();
        Self::place_subset(&all, options)
    }
}
