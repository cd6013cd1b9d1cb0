//! Hierarchical placement: owners above what they own.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::graph::LayoutGraph;
use super::{LayoutOptions, LayoutStrategy, Position, LAYER_GAP};

/// Number of down+up barycenter sweeps.
const ORDERING_SWEEPS: usize = 4;

/// Longest-path layering with barycentric crossing reduction.
#[derive(Debug, Default)]
pub struct LayeredLayout;

impl LayeredLayout {
    pub(crate) fn place_subset(graph: &LayoutGraph, members: &[usize], options: &LayoutOptions) -> Vec<Position> {
        let n = members.len();
        let mut local = vec![usize::MAX; graph.len()];
        for (i, &v) in members.iter().enumerate() {
            local[v] = i;
        }

        let mut out: Vec<Vec<usize>> = vec![Vec::new(); n];
        for &(s, t) in &graph.links {
            if local[s] != usize::MAX && local[t] != usize::MAX {
                out[local[s]].push(local[t]);
            }
        }
        for list in &mut out {
            list.sort_unstable();
        }

        let dag = break_cycles(&out);
        let layer = longest_path_layers(&dag);
        let depth = layer.iter().copied().max().unwrap_or(0);

        let mut layers: Vec<Vec<usize>> = vec![Vec::new(); depth + 1];
        for v in 0..n {
            layers[layer[v]].push(v);
        }

        let mut undirected: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (s, targets) in dag.iter().enumerate() {
            for &t in targets {
                undirected[s].push(t);
                undirected[t].push(s);
            }
        }

        let mut order = vec![0usize; n];
        let refresh = |layers: &[Vec<usize>], order: &mut [usize]| {
            for row in layers {
                for (i, &v) in row.iter().enumerate() {
                    order[v] = i;
                }
            }
        };
        refresh(&layers, &mut order);

        for _ in 0..ORDERING_SWEEPS {
            for l in 1..layers.len() {
                reorder(&mut layers[l], l - 1, &layer, &undirected, &order);
                refresh(&layers, &mut order);
            }
            for l in (0..layers.len().saturating_sub(1)).rev() {
                reorder(&mut layers[l], l + 1, &layer, &undirected, &order);
                refresh(&layers, &mut order);
            }
        }

        let mut positions = vec![Position::default(); n];
        for (l, row) in layers.iter().enumerate() {
            let offset = (row.len() as f64 - 1.0) / 2.0;
            for (i, &v) in row.iter().enumerate() {
                positions[v] = Position {
                    x: (i as f64 - offset) * options.spacing,
                    y: l as f64 * LAYER_GAP,
                };
            }
        }
        positions
    }
}

impl LayoutStrategy for LayeredLayout {
    fn name(&self) -> &'static str {
        "layered"
    }

    fn place(&self, graph: &LayoutGraph, options: &LayoutOptions, _rng_seed: u64) -> Vec<Position> {
        let all: Vec<usize> = (0..graph.len()).collect();
        Self::place_subset(graph, &all, options)
    }
}

/// Reverse DFS back edges, visiting roots and children in index order.
fn break_cycles(out: &[Vec<usize>]) -> Vec<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    let n = out.len();
    let mut mark = vec![Mark::New; n];
    let mut dag: Vec<Vec<usize>> = vec![Vec::new(); n];

    for root in 0..n {
        if mark[root] != Mark::New {
            continue;
        }
        mark[root] = Mark::Active;
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some(top) = stack.last_mut() {
            let (v, next) = *top;
            if next < out[v].len() {
                top.1 += 1;
                let w = out[v][next];
                match mark[w] {
                    Mark::Active => dag[w].push(v),
                    Mark::Done => dag[v].push(w),
                    Mark::New => {
                        dag[v].push(w);
                        mark[w] = Mark::Active;
                        stack.push((w, 0));
                    }
                }
            } else {
                mark[v] = Mark::Done;
                stack.pop();
            }
        }
    }

    for list in &mut dag {
        list.sort_unstable();
        list.dedup();
    }
    dag
}

fn longest_path_layers(dag: &[Vec<usize>]) -> Vec<usize> {
    let n = dag.len();
    let mut indegree = vec![0usize; n];
    for targets in dag {
        for &t in targets {
            indegree[t] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n).filter(|&v| indegree[v] == 0).map(Reverse).collect();
    let mut layer = vec![0usize; n];
    while let Some(Reverse(v)) = ready.pop() {
        for &t in &dag[v] {
            layer[t] = layer[t].max(layer[v] + 1);
            indegree[t] -= 1;
            if indegree[t] == 0 {
                ready.push(Reverse(t));
            }
        }
    }
    layer
}

fn reorder(row: &mut [usize], reference: usize, layer: &[usize], adjacency: &[Vec<usize>], order: &[usize]) {
    let mut keyed: Vec<(f64, usize, usize)> = row
        .iter()
        .map(|&v| {
            let anchors: Vec<f64> = adjacency[v]
                .iter()
                .filter(|&&w| layer[w] == reference)
                .map(|&w| order[w] as f64)
                .collect();
            let key = if anchors.is_empty() {
                order[v] as f64
            } else {
                anchors.iter().sum::<f64>() / anchors.len() as f64
            };
            (key, order[v], v)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    for (slot, (_, _, v)) in row.iter_mut().zip(keyed) {
        *slot = v;
    }
}
