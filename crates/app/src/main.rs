mod flame;

use std::{path::PathBuf, rc::Rc};

use clap::{Parser, Subcommand};
use flame::{FlamePlugin, TimeGridHeader};
use flame_canvas_core::{
    clusterize_flat_tree, flat_tree, flat_tree_min_max, meta_clusterize_flat_tree,
    validate_tree, ChartSettings, ClusterOptions, FlameCanvas, ManualScheduler, Plugin,
    RecordingCanvas, SourceNode, HIT_REGION_REBUILD_DELAY,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const HEADER_HEIGHT: f64 = 20.0;

fn main() -> flame_canvas_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { input, width } => run_inspect(&input, width),
        Commands::Render {
            input,
            output,
            width,
            height,
            settings,
            zoom_start,
            zoom_end,
        } => run_render(RenderArgs {
            input,
            output,
            width,
            height,
            settings,
            zoom: zoom_start.zip(zoom_end),
        }),
    }
}

/// Accepts either a list of roots or a single root node.
fn load_tree(input: &PathBuf) -> flame_canvas_core::Result<Vec<Rc<SourceNode>>> {
    let text = std::fs::read_to_string(input)?;
    let value: Value = serde_json::from_str(&text)?;
    let roots = match value {
        Value::Array(_) => serde_json::from_value::<Vec<Rc<SourceNode>>>(value)?,
        other => vec![serde_json::from_value::<Rc<SourceNode>>(other)?],
    };
    validate_tree(&roots)?;
    Ok(roots)
}

fn run_inspect(input: &PathBuf, width: f64) -> flame_canvas_core::Result<()> {
    tracing::info!(?input, width, "inspecting tree");

    let roots = load_tree(input)?;
    let flat = flat_tree(&roots);
    if flat.is_empty() {
        println!("nodes: 0");
        return Ok(());
    }

    let min_max = flat_tree_min_max(&flat);
    let levels = flat.iter().map(|node| node.level + 1).max().unwrap_or(0);
    let meta = meta_clusterize_flat_tree(&flat, flame_canvas_core::clusters::default_clusterize_condition);
    let span = min_max.max - min_max.min;
    let zoom = if span > 0.0 { width / span } else { 1.0 };
    let clusters = clusterize_flat_tree(
        &meta,
        zoom,
        min_max.min,
        min_max.max,
        ClusterOptions::default(),
    );

    println!("nodes: {}", flat.len());
    println!("levels: {levels}");
    println!("min: {}", min_max.min);
    println!("max: {}", min_max.max);
    println!("meta clusters: {}", meta.len());
    println!("clusters at {width}px: {}", clusters.len());
    Ok(())
}

struct RenderArgs {
    input: PathBuf,
    output: PathBuf,
    width: f64,
    height: f64,
    settings: Option<PathBuf>,
    zoom: Option<(f64, f64)>,
}

fn run_render(args: RenderArgs) -> flame_canvas_core::Result<()> {
    tracing::info!(input = ?args.input, output = ?args.output, "rendering tree");

    let roots = load_tree(&args.input)?;
    let settings = match &args.settings {
        Some(path) => ChartSettings::from_json_str(&std::fs::read_to_string(path)?)?,
        None => ChartSettings::default(),
    };

    let plugins: Vec<Box<dyn Plugin<RecordingCanvas>>> = vec![
        Box::new(TimeGridHeader::new(HEADER_HEIGHT)),
        Box::new(FlamePlugin::new("flame", &roots)),
    ];
    let mut chart = FlameCanvas::new(
        RecordingCanvas::new(args.width, args.height),
        ManualScheduler::new(),
        settings,
        plugins,
    );
    if let Some((start, end)) = args.zoom {
        chart.set_zoom(start, end);
    }

    let frames = chart.run_frames();
    chart.advance_time(HIT_REGION_REBUILD_DELAY);
    tracing::debug!(frames, "frames rendered");

    let commands = chart.canvas().commands();
    std::fs::write(&args.output, serde_json::to_vec_pretty(commands)?)?;
    tracing::info!(commands = commands.len(), output = ?args.output, "draw commands written");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Canvas flame chart renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a tree and report how it clusters at full-domain zoom.
    Inspect {
        /// JSON file with one root node or a list of roots.
        input: PathBuf,
        /// Canvas width in pixels used to derive the zoom.
        #[arg(long, default_value_t = 1000.0)]
        width: f64,
    },
    /// Render a tree through the chart engine and dump the draw commands.
    Render {
        /// JSON file with one root node or a list of roots.
        input: PathBuf,
        /// Output path for the recorded draw commands.
        output: PathBuf,
        #[arg(long, default_value_t = 1000.0)]
        width: f64,
        #[arg(long, default_value_t = 400.0)]
        height: f64,
        /// JSON settings overrides merged over the defaults.
        #[arg(short, long)]
        settings: Option<PathBuf>,
        #[arg(long, requires = "zoom_end")]
        zoom_start: Option<f64>,
        #[arg(long, requires = "zoom_start")]
        zoom_end: Option<f64>,
    },
}
