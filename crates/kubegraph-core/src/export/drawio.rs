use std::collections::HashMap;
use std::fmt::Write;

use super::{escape_xml, node_label, Scene};
use crate::layout::{NODE_HEIGHT, NODE_WIDTH};
use crate::model::NodeId;

const EMPTY: &str = r#"<mxfile host="app.diagrams.net"><diagram id="0" name="empty"><mxGraphModel dx="0" dy="0" grid="1" gridSize="10"><root><mxCell id="0"/><mxCell id="1" parent="0"/></root></mxGraphModel></diagram></mxfile>"#;

const NODE_STYLE: &str = "rounded=1;whiteSpace=wrap;html=1;fillColor=#e2e8f0;strokeColor=#64748b;";
const EDGE_STYLE: &str = "endArrow=classic;html=1;strokeColor=#94a3b8;";

/// diagrams.net document. Cell `1` is the default layer; nodes and then
/// edges are numbered from `2`.
pub(super) fn render(scene: &Scene<'_>) -> Vec<u8> {
    if scene.is_empty() {
        return EMPTY.as_bytes().to_vec();
    }

    let mut out = String::new();
    out.push_str(r#"<mxfile host="app.diagrams.net" agent="kubegraph" version="21.0.0">"#);
    out.push('\n');
    out.push_str(r#"  <diagram id="topology" name="Topology">"#);
    out.push('\n');
    out.push_str(r#"    <mxGraphModel dx="1200" dy="800" grid="1" gridSize="10">"#);
    out.push_str("\n      <root>\n");
    out.push_str("        <mxCell id=\"0\"/>\n");
    out.push_str("        <mxCell id=\"1\" parent=\"0\"/>\n");

    let mut next_id = 2usize;
    let mut cells: HashMap<&NodeId, usize> = HashMap::new();
    for (node, p) in scene.placed() {
        cells.insert(&node.id, next_id);
        let _ = writeln!(
            out,
            r#"        <mxCell id="{}" parent="1" value="{}" style="{}" vertex="1"><mxGeometry x="{}" y="{}" width="{}" height="{}" as="geometry"/></mxCell>"#,
            next_id,
            escape_xml(&node_label(node)),
            NODE_STYLE,
            p.x,
            p.y,
            NODE_WIDTH,
            NODE_HEIGHT
        );
        next_id += 1;
    }

    for edge in scene.edges {
        let (Some(source), Some(target)) = (cells.get(&edge.source), cells.get(&edge.target)) else {
            continue;
        };
        let _ = writeln!(
            out,
            r#"        <mxCell id="{}" parent="1" value="{}" style="{}" edge="1" source="{}" target="{}"><mxGeometry relative="1" as="geometry"/></mxCell>"#,
            next_id,
            escape_xml(edge.label.as_deref().unwrap_or("")),
            EDGE_STYLE,
            source,
            target
        );
        next_id += 1;
    }

    out.push_str("      </root>\n    </mxGraphModel>\n  </diagram>\n</mxfile>\n");
    out.into_bytes()
}
