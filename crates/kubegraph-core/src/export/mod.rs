//! Export artifacts rendered from a laid-out graph.
//!
//! Every renderer reads positions from the [`Layout`] it is given and never
//! lays the graph out again, so an export matches the view it came from.
//! Outputs carry no wall-clock data: the same scene renders the same bytes.

mod drawio;
mod json;
mod pdf;
mod png;
mod svg;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::layout::{Layout, Position, NODE_HEIGHT, NODE_WIDTH};
use crate::model::{Edge, Node};

/// Margin around the drawing.
pub const CANVAS_PADDING: f64 = 40.0;
/// Smallest canvas width.
pub const MIN_CANVAS_WIDTH: f64 = 400.0;
/// Smallest canvas height.
pub const MIN_CANVAS_HEIGHT: f64 = 200.0;

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unknown export format '{0}': use png|svg|pdf|json|drawio")]
    UnknownFormat(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Canvas of {width}x{height} is too large to rasterize")]
    CanvasTooLarge { width: u64, height: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Raster image.
    Png,
    /// Vector image.
    Svg,
    /// Print document.
    Pdf,
    Json,
    /// diagrams.net XML.
    Drawio,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [Self::Png, Self::Svg, Self::Pdf, Self::Json, Self::Drawio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
            Self::Json => "json",
            Self::Drawio => "drawio",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
            Self::Pdf => "application/pdf",
            Self::Json => "application/json",
            Self::Drawio => "application/xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Drawio => "drawio",
            other => other.as_str(),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            "pdf" => Ok(Self::Pdf),
            "json" => Ok(Self::Json),
            "drawio" | "draw.io" | "xml" => Ok(Self::Drawio),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nodes and edges with the layout they are drawn with.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub nodes: &'a [Node],
    pub edges: &'a [Edge],
    pub layout: &'a Layout,
}

impl<'a> Scene<'a> {
    pub fn new(nodes: &'a [Node], edges: &'a [Edge], layout: &'a Layout) -> Self {
        Self { nodes, edges, layout }
    }

    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Canvas size in drawing units.
    fn canvas(&self) -> (f64, f64) {
        let (w, h) = self.layout.extent();
        (
            (w + 2.0 * CANVAS_PADDING).max(MIN_CANVAS_WIDTH),
            (h + 2.0 * CANVAS_PADDING).max(MIN_CANVAS_HEIGHT),
        )
    }

    /// Top-left corner of a node box on the canvas.
    fn place(&self, node: &Node) -> Option<Position> {
        self.layout.position(&node.id).map(|p| Position {
            x: p.x + CANVAS_PADDING,
            y: p.y + CANVAS_PADDING,
        })
    }

    /// Nodes that have a position, in input order.
    fn placed(&self) -> impl Iterator<Item = (&'a Node, Position)> + '_ {
        self.nodes.iter().filter_map(move |n| self.place(n).map(|p| (n, p)))
    }

    /// Edge segment from the bottom centre of the source box to the top
    /// centre of the target box.
    fn segment(&self, edge: &Edge) -> Option<(Position, Position)> {
        let from = self.layout.position(&edge.source)?;
        let to = self.layout.position(&edge.target)?;
        Some((
            Position {
                x: from.x + CANVAS_PADDING + NODE_WIDTH / 2.0,
                y: from.y + CANVAS_PADDING + NODE_HEIGHT,
            },
            Position {
                x: to.x + CANVAS_PADDING + NODE_WIDTH / 2.0,
                y: to.y + CANVAS_PADDING,
            },
        ))
    }
}

/// Render a scene in the requested format.
pub fn render(format: ExportFormat, scene: &Scene<'_>) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Png => png::render(scene),
        ExportFormat::Svg => Ok(svg::render(scene)),
        ExportFormat::Pdf => Ok(pdf::render(scene)),
        ExportFormat::Json => json::render(scene),
        ExportFormat::Drawio => Ok(drawio::render(scene)),
    }
}

/// `Kind: name`, with long names shortened.
pub(crate) fn node_label(node: &Node) -> String {
    format!("{}: {}", node.kind.api_name(), truncate(&node.name, 18, 15))
}

fn truncate(text: &str, max: usize, keep: usize) -> String {
    if text.chars().count() > max {
        let mut short: String = text.chars().take(keep).collect();
        short.push_str("...");
        short
    } else {
        text.to_string()
    }
}

pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
