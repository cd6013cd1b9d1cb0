//! Subcommand implementations.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use kubegraph_core::event::{self, WatchRecord};
use kubegraph_core::export::{self, Scene};
use kubegraph_core::history::{FileSnapshotStore, SnapshotStore, TimeRange};
use kubegraph_core::layout::Layout;
use kubegraph_core::projection::{Depth, Direction};
use kubegraph_core::{
    Config, ExportFormat, GraphFilter, GraphView, NodeId, ResourceKind, TopologyEngine,
    TopologyService, Validator,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum DirectionArg {
    Both,
    Out,
    In,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Both => Direction::Both,
            DirectionArg::Out => Direction::Outgoing,
            DirectionArg::In => Direction::Incoming,
        }
    }
}

/// Filter, layout and output options shared by the graph-producing commands.
#[derive(Args)]
pub struct ViewArgs {
    /// Keep only these namespaces (repeatable)
    #[arg(short, long = "namespace")]
    namespaces: Vec<String>,

    /// Keep only these kinds, e.g. pod, svc, deploy (repeatable)
    #[arg(short, long = "kind")]
    kinds: Vec<String>,

    /// Keep only resources with this label, as key=value (repeatable)
    #[arg(short, long = "label", value_parser = parse_label)]
    labels: Vec<(String, String)>,

    /// Center the view on one node id, e.g. pod/shop/web-6d4f-a
    #[arg(long)]
    focus: Option<String>,

    /// Hops around the focus node
    #[arg(long, default_value_t = 1)]
    depth: usize,

    /// Follow relationships around the focus without a hop limit
    #[arg(long)]
    unbounded: bool,

    /// Relationship direction followed from the focus
    #[arg(long, value_enum, default_value_t = DirectionArg::Both)]
    direction: DirectionArg,

    /// svg, png, pdf, json or drawio (defaults to the configured format)
    #[arg(short, long)]
    format: Option<String>,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Layout strategy: force, layered or grid
    #[arg(long)]
    strategy: Option<String>,

    /// Pin the layout seed (hex or decimal)
    #[arg(long)]
    seed: Option<String>,

    /// Print graph deltas while events are applied
    #[arg(long)]
    deltas: bool,

    /// Save the resulting graph to snapshot history
    #[arg(long)]
    persist: bool,
}

impl ViewArgs {
    fn filter(&self) -> Result<GraphFilter> {
        let mut filter = GraphFilter::all();
        for ns in &self.namespaces {
            filter = filter.namespace(ns.clone());
        }
        for kind in &self.kinds {
            filter = filter.kind(kind.parse::<ResourceKind>()?);
        }
        for (key, value) in &self.labels {
            filter = filter.label(key.clone(), value.clone());
        }
        if let Some(focus) = &self.focus {
            let depth = if self.unbounded {
                Depth::Unbounded
            } else {
                Depth::Bounded(self.depth)
            };
            filter = filter.focus(NodeId::from_raw(focus.clone()), depth, self.direction.into());
        }
        Ok(filter)
    }
}

fn parse_label(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

pub fn read_watch_stream(path: &Path) -> Result<Vec<WatchRecord>> {
    let text = std::fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
    let records = event::parse_records(&text).wrap_err_with(|| format!("parsing {}", path.display()))?;
    Ok(records)
}

pub fn read_manifests(paths: &[PathBuf]) -> Result<Vec<WatchRecord>> {
    let mut events = Vec::new();
    for path in paths {
        let text = std::fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
        let records = event::manifest_records(&text).wrap_err_with(|| format!("parsing {}", path.display()))?;
        events.extend(records.into_iter().filter(|r| matches!(r, WatchRecord::Event(_))));
    }
    // Every kind is fully listed once all files are read.
    events.extend(ResourceKind::ALL.iter().map(|&kind| WatchRecord::Sync { kind }));
    Ok(events)
}

fn export_format(requested: Option<&str>, config: &Config) -> Result<ExportFormat> {
    Ok(requested.unwrap_or(config.export.default_format.as_str()).parse()?)
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, bytes).wrap_err_with(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), bytes = bytes.len(), "Export written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn summarize(view: &GraphView) {
    eprintln!(
        "version {}  {} nodes  {} edges  {} layout  seed {}",
        view.version,
        view.nodes.len(),
        view.edges.len(),
        view.layout.strategy,
        view.layout_seed
    );
    for violation in &view.validation.violations {
        warn!(code = %violation.code, "{}", violation.message);
    }
}

/// Feed `records` through the engine, then export the filtered view.
pub async fn render(records: Vec<WatchRecord>, args: &ViewArgs, mut config: Config) -> Result<()> {
    if let Some(strategy) = &args.strategy {
        config.layout.strategy = strategy.clone();
    }
    if let Some(seed) = &args.seed {
        config.layout.seed = Some(seed.clone());
    }
    config.validate()?;
    let filter = args.filter()?;
    let format = export_format(args.format.as_deref(), &config)?;

    let engine = TopologyEngine::spawn(&config.engine);
    let history = Arc::new(FileSnapshotStore::with_config(&config.storage));
    let service = TopologyService::new(&engine, history, &config)?;

    let printer = args.deltas.then(|| {
        let mut deltas = service.stream_graph_deltas();
        tokio::spawn(async move {
            while let Some(delta) = deltas.next().await {
                eprintln!(
                    "delta v{}: +{} nodes -{} nodes +{} edges -{} edges",
                    delta.version,
                    delta.added_nodes.len(),
                    delta.removed_node_ids.len(),
                    delta.added_edges.len(),
                    delta.removed_edge_ids.len()
                );
            }
        })
    });

    let progress = ProgressBar::new(records.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("  {spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} events ({per_sec})")?
            .progress_chars("=>-"),
    );
    for record in records {
        engine.submit_record(record).await?;
        progress.inc(1);
    }
    let version = engine.flush().await?;
    progress.finish_and_clear();

    let stats = engine.stats();
    info!(
        version,
        applied = stats.builder.events_applied,
        rejected = stats.builder.objects_rejected,
        pending = stats.builder.pending_edges,
        "Events applied"
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let view = service.get_current_graph(&filter, &cancel).await?;
    summarize(&view);
    let bytes = service.render_export(format, &filter, &cancel).await?;
    write_output(args.output.as_deref(), &bytes)?;

    if args.persist {
        let saved = service.persist_snapshot().await?;
        eprintln!("saved snapshot {}", saved.id);
    }

    if let Some(printer) = printer {
        printer.abort();
    }
    engine.shutdown().await;
    Ok(())
}

pub fn convert(inputs: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let records = read_manifests(inputs)?;
    let text = event::write_records(&records)?;
    write_output(output, text.as_bytes())
}

pub async fn history(config: &Config, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Result<()> {
    let store = FileSnapshotStore::with_config(&config.storage);
    let refs = store.list(TimeRange { from, to }).await?;
    if refs.is_empty() {
        println!("No snapshots found in {}", store.dir().display());
        return Ok(());
    }

    for r in refs {
        println!(
            "{}  {}  v{:<6} {:>5} nodes {:>5} edges",
            r.id,
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.version,
            r.node_count,
            r.edge_count
        );
    }
    Ok(())
}

pub async fn show(config: &Config, id: Uuid, format: Option<&str>, output: Option<&Path>) -> Result<()> {
    let store = FileSnapshotStore::with_config(&config.storage);
    let record = store.load(id).await?;
    let format = export_format(format, config)?;

    let report = Validator::new().validate(&record.nodes, &record.edges);
    if !report.is_complete() {
        warn!(violations = report.violations.len(), "Stored snapshot is degraded");
    }
    if record.nodes.iter().any(|n| !record.positions.contains_key(&n.id)) {
        return Err(eyre!("snapshot {} has no stored position for some nodes", id));
    }

    let layout = Layout {
        seed: record.layout_seed.clone(),
        strategy: config.layout.strategy_kind()?,
        positions: record.positions.clone(),
    };
    let bytes = export::render(format, &Scene::new(&record.nodes, &record.edges, &layout))?;
    write_output(output, &bytes)
}

pub fn print_config(init: bool) -> Result<()> {
    let text = Config::default_config_string();
    if !init {
        print!("{}", text);
        return Ok(());
    }

    let path = Path::new("kubegraph.toml");
    if path.exists() {
        return Err(eyre!("{} already exists", path.display()));
    }
    std::fs::write(path, text)?;
    println!("Wrote {}", path.display());
    Ok(())
}
