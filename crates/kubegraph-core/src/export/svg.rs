use std::fmt::Write;

use super::{escape_xml, node_label, Scene};
use crate::layout::{NODE_HEIGHT, NODE_WIDTH};

const EMPTY: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="100"><text x="20" y="50" font-size="14">No resources</text></svg>"#;

const STYLE: &str = "<defs><style>.node { fill: #e2e8f0; stroke: #64748b; stroke-width: 1; } \
.edge { stroke: #94a3b8; stroke-width: 2; fill: none; } \
.label { font: 12px sans-serif; fill: #334155; }</style></defs>";

pub(super) fn render(scene: &Scene<'_>) -> Vec<u8> {
    if scene.is_empty() {
        return EMPTY.as_bytes().to_vec();
    }

    let (width, height) = scene.canvas();
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    );
    out.push_str(STYLE);

    for edge in scene.edges {
        if let Some((from, to)) = scene.segment(edge) {
            let _ = write!(
                out,
                r#"<path class="edge" data-relation="{}" d="M {} {} L {} {}"/>"#,
                edge.relation, from.x, from.y, to.x, to.y
            );
        }
    }

    for (node, p) in scene.placed() {
        let _ = write!(
            out,
            r#"<g data-id="{id}"><rect class="node" x="{x}" y="{y}" width="{w}" height="{h}" rx="4"/><text class="label" x="{tx}" y="{ty}" text-anchor="middle">{label}</text></g>"#,
            id = escape_xml(node.id.as_str()),
            x = p.x,
            y = p.y,
            w = NODE_WIDTH,
            h = NODE_HEIGHT,
            tx = p.x + NODE_WIDTH / 2.0,
            ty = p.y + NODE_HEIGHT / 2.0 + 4.0,
            label = escape_xml(&node_label(node)),
        );
    }

    out.push_str("</svg>");
    out.into_bytes()
}
