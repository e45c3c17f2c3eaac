use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use trialgraph::config::TrialConfig;
use trialgraph::graph::TrialGraph;
use trialgraph::model::TrialGraphData;

#[derive(Parser, Debug)]
#[command(author, version, about = "Render a trial (or trial diff) JSON dataset as an SVG tree", long_about = None)]
struct Cli {
    /// Trial dataset JSON file
    #[arg(value_name = "TRIAL_FILE")]
    trial_file: Utf8PathBuf,

    /// First trial id (defaults to the first trial found in the dataset)
    #[arg(long)]
    t1: Option<String>,

    /// Second trial id (defaults to the second trial found, or to --t1 when only that is given)
    #[arg(long)]
    t2: Option<String>,

    /// Optional JSON file with display settings
    #[arg(long, value_name = "CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Output SVG file
    #[arg(short, long, default_value = "trial.svg")]
    output: Utf8PathBuf,

    /// Collapse the node with this index before exporting (repeatable)
    #[arg(long, value_name = "INDEX")]
    collapse: Vec<i64>,

    /// Print the rendered nodes and edges instead of only writing the SVG
    #[arg(long)]
    summary: bool,

    /// Base URL of the backend used for activation diffs
    #[arg(long)]
    base_url: Option<String>,

    /// Open the interactive viewer instead of exporting
    #[cfg(feature = "egui")]
    #[arg(long)]
    view: bool,
}

fn load_config(path: Option<&Utf8PathBuf>) -> Result<TrialConfig> {
    let Some(path) = path else {
        return Ok(TrialConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("Open {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let data = TrialGraphData::load_json(&cli.trial_file)?;
    let mut config = load_config(cli.config.as_ref())?;
    if cli.base_url.is_some() {
        config.diff.base_url = cli.base_url.clone();
    }
    let defaults = data.default_trials();
    let t1 = cli
        .t1
        .clone()
        .or_else(|| defaults.as_ref().map(|(t1, _)| t1.clone()))
        .context("Dataset names no trial; pass --t1")?;
    let t2 = match (&cli.t2, &cli.t1, &defaults) {
        (Some(t2), _, _) => t2.clone(),
        // An explicit --t1 alone shows that trial by itself.
        (None, Some(_), _) => t1.clone(),
        (None, None, Some((_, t2))) => t2.clone(),
        (None, None, None) => t1.clone(),
    };

    #[cfg(feature = "egui")]
    if cli.view {
        return trialgraph::egui_app::run_viewer(data, t1, t2, config);
    }

    let mut graph = TrialGraph::new("trial", config, Default::default());
    graph.load(data, t1, t2)?;
    for index in &cli.collapse {
        let tree = graph.tree().context("Dataset has no root node")?;
        let id = tree.find(*index).with_context(|| format!("No node with index {}", index))?;
        if tree.node(id).is_collapsed() {
            continue;
        }
        graph.toggle(*index)?;
    }

    if cli.summary {
        let state = graph.rendered();
        println!("{} visible nodes, {} edges", state.nodes.len(), state.edges.len());
        for node in state.nodes.values() {
            println!(
                "  node {:>4} at ({:.1}, {:.1}){}",
                node.glyph.index,
                node.pos.x,
                node.pos.y,
                if node.glyph.collapsed { " [collapsed]" } else { "" }
            );
        }
        for edge in state.edges.values() {
            println!("  edge {:<12} {:?} {}", edge.id, edge.kind, edge.label);
        }
    }

    let path = graph.download(Some(cli.output.as_path()))?;
    println!("Wrote {}", path);
    Ok(())
}
