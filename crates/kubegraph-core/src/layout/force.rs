//! Seeded Fruchterman-Reingold placement.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::graph::LayoutGraph;
use super::grid::GridLayout;
use super::layered::LayeredLayout;
use super::{LayoutOptions, LayoutStrategy, Position};

/// Force-directed layout, one component at a time.
///
/// Initial positions come from a [`StdRng`] seeded with the layout seed and
/// every loop walks nodes and links in index order, so results are
/// bit-identical for the same graph and seed. Components are packed left to
/// right, isolated nodes go into a grid block after them.
#[derive(Debug, Default)]
pub struct ForceLayout;

impl ForceLayout {
    fn place_component(
        graph: &LayoutGraph,
        members: &[usize],
        options: &LayoutOptions,
        rng: &mut StdRng,
    ) -> Vec<Position> {
        let n = members.len();
        let k = options.spacing;
        let side = k * (n as f64).sqrt();

        let mut local = vec![usize::MAX; graph.len()];
        for (i, &v) in members.iter().enumerate() {
            local[v] = i;
        }
        let links: Vec<(usize, usize)> = graph
            .links
            .iter()
            .filter(|(s, t)| local[*s] != usize::MAX && local[*t] != usize::MAX)
            .map(|&(s, t)| (local[s], local[t]))
            .collect();

        let mut pos: Vec<Position> = (0..n)
            .map(|_| Position {
                x: rng.gen_range(0.0..side.max(1.0)),
                y: rng.gen_range(0.0..side.max(1.0)),
            })
            .collect();

        let iterations = options.iterations.max(1);
        let start_temp = side.max(k) / 10.0;
        let mut disp = vec![(0.0f64, 0.0f64); n];

        for step in 0..iterations {
            let temp = start_temp * (1.0 - step as f64 / iterations as f64);
            disp.iter_mut().for_each(|d| *d = (0.0, 0.0));

            for i in 0..n {
                for j in (i + 1)..n {
                    let (mut dx, mut dy) = (pos[i].x - pos[j].x, pos[i].y - pos[j].y);
                    let mut dist = (dx * dx + dy * dy).sqrt();
                    if dist < 0.01 {
                        // Coincident points: push apart along x.
                        dx = 0.01;
                        dy = 0.0;
                        dist = 0.01;
                    }
                    let force = k * k / dist;
                    let (fx, fy) = (dx / dist * force, dy / dist * force);
                    disp[i].0 += fx;
                    disp[i].1 += fy;
                    disp[j].0 -= fx;
                    disp[j].1 -= fy;
                }
            }

            for &(s, t) in &links {
                let (dx, dy) = (pos[s].x - pos[t].x, pos[s].y - pos[t].y);
                let dist = (dx * dx + dy * dy).sqrt().max(0.01);
                let force = dist * dist / k;
                let (fx, fy) = (dx / dist * force, dy / dist * force);
                disp[s].0 -= fx;
                disp[s].1 -= fy;
                disp[t].0 += fx;
                disp[t].1 += fy;
            }

            for (p, &(dx, dy)) in pos.iter_mut().zip(disp.iter()) {
                let len = (dx * dx + dy * dy).sqrt();
                if len > 0.0 {
                    let capped = len.min(temp);
                    p.x += dx / len * capped;
                    p.y += dy / len * capped;
                }
            }
        }

        pos
    }
}

impl LayoutStrategy for ForceLayout {
    fn name(&self) -> &'static str {
        "force"
    }

    fn place(&self, graph: &LayoutGraph, options: &LayoutOptions, rng_seed: u64) -> Vec<Position> {
        let mut rng = StdRng::seed_from_u64(rng_seed);
        let mut positions = vec![Position::default(); graph.len()];
        let mut cursor_x = 0.0;
        let mut isolated = Vec::new();

        for members in graph.components() {
            if members.len() == 1 {
                isolated.push(members[0]);
                continue;
            }
            let local = if members.len() > options.force_node_limit {
                LayeredLayout::place_subset(graph, &members, options)
            } else {
                Self::place_component(graph, &members, options, &mut rng)
            };
            let (min_x, min_y, max_x, _) = super::bounds(&local);
            for (&v, p) in members.iter().zip(local.iter()) {
                positions[v] = Position {
                    x: p.x - min_x + cursor_x,
                    y: p.y - min_y,
                };
            }
            cursor_x += (max_x - min_x) + options.spacing;
        }

        if !isolated.is_empty() {
            let block = GridLayout::place_subset(&isolated, options);
            for (&v, p) in isolated.iter().zip(block.iter()) {
                positions[v] = Position {
                    x: p.x + cursor_x,
                    y: p.y,
                };
            }
        }

        positions
    }
}
