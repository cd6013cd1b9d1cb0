mod commands;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use kubegraph_core::Config;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use commands::ViewArgs;

#[derive(Parser)]
#[command(name = "kubegraph")]
#[command(about = "Deterministic topology graphs of Kubernetes resources", long_about = None)]
struct Cli {
    /// Config file (defaults to ./kubegraph.toml, then the user config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log engine internals
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded watch stream (JSON lines) and export the graph
    Replay {
        /// Recorded events, one JSON object per line
        input: PathBuf,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// Load YAML manifests and export the graph
    Manifests {
        /// Multi-document YAML, `kubectl get -o yaml` output included
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// Turn YAML manifests into a replayable watch stream
    Convert {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List persisted snapshots
    History {
        /// Only snapshots taken at or after this RFC 3339 time
        #[arg(long)]
        from: Option<DateTime<Utc>>,

        /// Only snapshots taken at or before this RFC 3339 time
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
    /// Re-export a persisted snapshot with its stored layout
    Show {
        id: Uuid,

        /// svg, png, pdf, json or drawio
        #[arg(short, long)]
        format: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the default configuration
    Config {
        /// Write ./kubegraph.toml instead of printing
        #[arg(long)]
        init: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "kubegraph=debug,kubegraph_core=debug"
    } else {
        "kubegraph=info,kubegraph_core=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Replay { input, view } => {
            let records = commands::read_watch_stream(&input)?;
            commands::render(records, &view, config).await
        }
        Commands::Manifests { inputs, view } => {
            let records = commands::read_manifests(&inputs)?;
            commands::render(records, &view, config).await
        }
        Commands::Convert { inputs, output } => commands::convert(&inputs, output.as_deref()),
        Commands::History { from, to } => commands::history(&config, from, to).await,
        Commands::Show { id, format, output } => {
            commands::show(&config, id, format.as_deref(), output.as_deref()).await
        }
        Commands::Config { init } => commands::print_config(init),
    }
}
