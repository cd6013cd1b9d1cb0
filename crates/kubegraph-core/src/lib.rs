pub mod builder;
pub mod config;
pub mod engine;
pub mod event;
pub mod export;
pub mod history;
pub mod layout;
pub mod model;
pub mod projection;
pub mod rules;
pub mod service;
pub mod store;
pub mod validate;

pub use builder::TopologyBuilder;
pub use config::Config;
pub use engine::{KindSource, TopologyEngine};
pub use event::{Action, WatchEvent, WatchRecord};
pub use export::ExportFormat;
pub use layout::{Layout, LayoutEngine, LayoutSeed};
pub use model::{Edge, EdgeId, Node, NodeId, Relation, ResourceKind};
pub use projection::GraphFilter;
pub use service::{GraphView, TopologyService};
pub use store::{GraphDelta, GraphSnapshot, GraphStore};
pub use validate::{ValidationReport, Validator};
