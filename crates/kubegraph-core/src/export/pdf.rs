//! Single-page PDF 1.4 writer.
//!
//! The page is sized to the canvas. Boxes, edges and labels are drawn with
//! plain path and text operators in the standard Helvetica font, so the file
//! needs no embedded resources.

use std::fmt::Write;

use super::{node_label, Scene};
use crate::layout::{NODE_HEIGHT, NODE_WIDTH};

const LABEL_SIZE: f64 = 9.0;

pub(super) fn render(scene: &Scene<'_>) -> Vec<u8> {
    let (width, height) = if scene.is_empty() { (400.0, 100.0) } else { scene.canvas() };
    let content = page_content(scene, height);

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>",
            num(width),
            num(height)
        ),
        format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
    ];

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, body);
    }

    let xref = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = writeln!(out, "{:010} 00000 n ", offset);
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref
    );
    out.into_bytes()
}

fn page_content(scene: &Scene<'_>, page_height: f64) -> String {
    let mut ops = String::new();
    // PDF user space grows upwards.
    let flip = |y: f64| page_height - y;

    if scene.is_empty() {
        let _ = write!(ops, "BT /F1 14 Tf 20 {} Td (No resources) Tj ET", num(flip(50.0)));
        return ops;
    }

    ops.push_str("0.580 0.639 0.722 RG 2 w\n");
    for edge in scene.edges {
        if let Some((from, to)) = scene.segment(edge) {
            let _ = writeln!(
                ops,
                "{} {} m {} {} l S",
                num(from.x),
                num(flip(from.y)),
                num(to.x),
                num(flip(to.y))
            );
        }
    }

    ops.push_str("0.886 0.910 0.941 rg 0.392 0.455 0.545 RG 1 w\n");
    for (_, p) in scene.placed() {
        let _ = writeln!(
            ops,
            "{} {} {} {} re B",
            num(p.x),
            num(flip(p.y + NODE_HEIGHT)),
            num(NODE_WIDTH),
            num(NODE_HEIGHT)
        );
    }

    ops.push_str("0.200 0.255 0.333 rg\n");
    for (node, p) in scene.placed() {
        let _ = writeln!(
            ops,
            "BT /F1 {} Tf {} {} Td ({}) Tj ET",
            num(LABEL_SIZE),
            num(p.x + 6.0),
            num(flip(p.y + NODE_HEIGHT / 2.0 + 3.0)),
            escape_text(&node_label(node))
        );
    }
    ops
}

/// Fixed two-decimal number formatting.
fn num(v: f64) -> String {
    format!("{:.2}", v)
}

/// Escape a PDF literal string. Characters outside printable ASCII become `?`.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}
