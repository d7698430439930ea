//! wfgraph CLI - workflow history event graph

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;

use wfgraph::cluster::ClusterView;
use wfgraph::config::positive;
use wfgraph::event::EventCategory;
use wfgraph::graph::GraphBuilder;
use wfgraph::{
    is_history_archival_enabled, is_visibility_archival_enabled, ClusterSnapshot,
    ConnectionKind, DomainSettings, EventId, FixSuggestion, Graph, GraphConfig, GraphError,
    GraphView, History, LayoutDirection, Result,
};

#[derive(Parser)]
#[command(name = "wfgraph")]
#[command(about = "Workflow history event graph: layout, pan center and summaries")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/wfgraph/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and lay out the event graph of a history file
    Layout {
        /// History file (.json, .yaml or .yml)
        file: PathBuf,

        /// Flow direction (tb, lr)
        #[arg(short, long)]
        direction: Option<LayoutDirection>,

        /// Mark one event as selected
        #[arg(short, long)]
        select: Option<EventId>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Pan offset that centers an event in the viewport
    Center {
        /// History file (.json, .yaml or .yml)
        file: PathBuf,

        /// Event id to center
        #[arg(short, long)]
        node: EventId,

        #[arg(short, long)]
        direction: Option<LayoutDirection>,

        #[arg(long)]
        width: Option<f64>,

        #[arg(long)]
        height: Option<f64>,

        #[arg(long)]
        zoom: Option<f64>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Summarize a history: event kinds, threads, skipped events
    Inspect {
        /// History file (.json, .yaml or .yml)
        file: PathBuf,
    },

    /// Show archival flags of a domain description
    Domain {
        /// Domain description file (.json, .yaml or .yml)
        file: PathBuf,
    },

    /// Show the visibility view of a cluster snapshot
    Cluster {
        /// Cluster snapshot file (.json, .yaml or .yml)
        file: PathBuf,
    },
}

fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so JSON output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Layout { file, direction, select, format } => {
            let config = load_config(cli.config.as_deref())?;
            layout_command(&file, config, direction, select, format)
        }
        Commands::Center { file, node, direction, width, height, zoom, format } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(width) = width {
                config.viewport.width = positive("--width", width)?;
            }
            if let Some(height) = height {
                config.viewport.height = positive("--height", height)?;
            }
            if let Some(zoom) = zoom {
                config.viewport.zoom = positive("--zoom", zoom)?;
            }
            center_command(&file, config, direction, node, format)
        }
        Commands::Inspect { file } => inspect_command(&file),
        Commands::Domain { file } => domain_command(&file),
        Commands::Cluster { file } => cluster_command(&file),
    }
}

fn load_config(path: Option<&Path>) -> Result<GraphConfig> {
    let config = match path {
        Some(path) => GraphConfig::load_from(path)?,
        None => GraphConfig::load()?,
    };
    config.with_env()
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn read_history(path: &Path) -> Result<History> {
    let content = fs::read_to_string(path)?;
    let history = if is_yaml(path) {
        History::from_yaml_str(&content)?
    } else {
        content.parse()?
    };

    if !history.skipped().is_empty() {
        eprintln!(
            "{} skipped {} malformed event(s)",
            "⚠".yellow(),
            history.skipped().len()
        );
    }
    Ok(history)
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    if is_yaml(path) {
        Ok(serde_yaml::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(&content)?)
    }
}

fn build_graph(file: &Path, mut config: GraphConfig, direction: Option<LayoutDirection>) -> Result<Graph> {
    if let Some(direction) = direction {
        config.layout.direction = direction;
    }
    let history = read_history(file)?;
    Ok(GraphBuilder::new(config.layout).build(history.events()))
}

fn layout_command(
    file: &Path,
    config: GraphConfig,
    direction: Option<LayoutDirection>,
    select: Option<EventId>,
    format: OutputFormat,
) -> Result<()> {
    let graph = build_graph(file, config, direction)?;

    let view = match select {
        Some(id) if !graph.contains(id) => return Err(GraphError::NodeNotFound { id }),
        Some(id) => graph.select_node(id),
        None => graph.view(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Text => print_layout(&view),
    }
    Ok(())
}

fn print_layout(view: &GraphView<'_>) {
    let graph = view.graph();
    let bounds = graph.bounds();

    println!(
        "{} {} events, {} connections, root {} ({} {:.0}x{:.0})",
        "→".cyan(),
        graph.len().to_string().bold(),
        graph.connections().len().to_string().bold(),
        graph
            .root()
            .map(|id| format!("#{id}"))
            .unwrap_or_else(|| "-".into())
            .cyan(),
        graph.direction(),
        bounds.width,
        bounds.height,
    );

    for (node, selected) in view.nodes() {
        let marker = if selected { "●".green().to_string() } else { " ".to_string() };
        let next: Vec<String> = node
            .chronological_children
            .iter()
            .map(|c| format!("{} ({})", c.id, c.thread))
            .collect();
        let inferred: Vec<String> = node.inferred_children.iter().map(|id| id.to_string()).collect();

        let mut line = format!(
            "{marker} {:>4}  {:<46} ({:>7.1}, {:>7.1})  {}",
            format!("#{}", node.id()),
            node.event_type().as_str(),
            node.position.x,
            node.position.y,
            node.thread.to_string().dimmed(),
        );
        if !next.is_empty() {
            line.push_str(&format!("  next: {}", next.join(", ")));
        }
        if !inferred.is_empty() {
            line.push_str(&format!("  inferred: {}", inferred.join(", ").magenta()));
        }
        println!("{line}");
    }
}

fn center_command(
    file: &Path,
    config: GraphConfig,
    direction: Option<LayoutDirection>,
    node: EventId,
    format: OutputFormat,
) -> Result<()> {
    let viewport = config.viewport;
    let graph = build_graph(file, config, direction)?;
    let pan = graph
        .select_node(node)
        .pan_center(&viewport)
        .ok_or(GraphError::NodeNotFound { id: node })?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&pan)?),
        OutputFormat::Text => println!(
            "{} #{} → pan x={:.1} y={:.1} (viewport {:.0}x{:.0}, zoom {})",
            "✓".green(),
            node,
            pan.x,
            pan.y,
            viewport.width,
            viewport.height,
            viewport.zoom,
        ),
    }
    Ok(())
}

fn inspect_command(file: &Path) -> Result<()> {
    let history = read_history(file)?;
    let graph = GraphBuilder::default().build(history.events());

    let mut categories: BTreeMap<EventCategory, usize> = BTreeMap::new();
    let mut unknown: Vec<&str> = Vec::new();
    for event in history.events() {
        *categories.entry(event.event_type.category()).or_default() += 1;
        if !event.event_type.is_known() {
            unknown.push(event.event_type.as_str());
        }
    }
    unknown.sort_unstable();
    unknown.dedup();

    println!("{} History '{}'", "✓".green(), file.display());
    println!("  Events: {}", history.len());
    for (category, count) in &categories {
        println!("    {:<18} {}", format!("{category:?}"), count);
    }
    if !unknown.is_empty() {
        println!("  Unknown types: {}", unknown.join(", ").yellow());
    }
    println!("  Threads: {}", graph.threads().len());
    println!(
        "  Connections: {} chronological, {} inferred",
        graph.connections_of_kind(ConnectionKind::Chronological).count(),
        graph.connections_of_kind(ConnectionKind::Inferred).count(),
    );
    println!(
        "  Root: {}",
        graph.root().map(|id| format!("#{id}")).unwrap_or_else(|| "-".into())
    );
    if !history.skipped().is_empty() {
        println!("  Skipped:");
        for malformed in history.skipped() {
            println!("    {} {}", "-".yellow(), malformed);
        }
    }
    Ok(())
}

fn domain_command(file: &Path) -> Result<()> {
    let settings: DomainSettings = read_document(file)?;
    let flag = |enabled: bool| if enabled { "enabled".green() } else { "disabled".red() };

    println!("History archival: {}", flag(is_history_archival_enabled(Some(&settings))));
    println!("Visibility archival: {}", flag(is_visibility_archival_enabled(Some(&settings))));
    Ok(())
}

fn cluster_command(file: &Path) -> Result<()> {
    let snapshot: ClusterSnapshot = read_document(file)?;
    let view = ClusterView::from_snapshot(&snapshot);

    println!(
        "Advanced visibility: {}",
        if view.advanced_visibility_enabled() { "enabled".green() } else { "disabled".red() }
    );
    for feature in view.visibility_features() {
        println!("  {:<32} {}", feature.key, feature.enabled);
    }
    if let Some(error) = view.fetch_error() {
        println!("Fetch error: {}", error.red());
    }
    match view.fetch_expiry() {
        Some(expiry) if view.is_expired(Utc::now()) => println!("Expired at {}", expiry.to_rfc3339()),
        Some(expiry) => println!("Expires at {}", expiry.to_rfc3339()),
        None => println!("No expiry recorded"),
    }
    Ok(())
}
