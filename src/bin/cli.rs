//! Binary entry point for the linegraph ingestion CLI.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use linegraph::{
    cli::{load_ingest_options, run_ingest, IngestConfig, IngestProgress, IngestSummary},
    ingest::IngestOptions,
    key::DEFAULT_PRECISION,
    store::{CacheMode, DuplicateEdges, OpenOptions, Synchronous},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "linegraph",
    version,
    about = "Build a routable graph store from GeoJSON line features"
)]
struct Cli {
    #[arg(
        value_name = "PATH",
        num_args = 2..,
        required = true,
        help = "Input GeoJSON files followed by the output store"
    )]
    paths: Vec<PathBuf>,

    #[arg(
        long,
        env = "LINEGRAPH_PRECISION",
        default_value_t = DEFAULT_PRECISION,
        help = "Decimal digits kept when deriving node keys (new stores only)"
    )]
    precision: u32,

    #[arg(
        long,
        env = "LINEGRAPH_BATCH_SIZE",
        value_name = "FEATURES",
        help = "Features committed per transaction"
    )]
    batch_size: Option<usize>,

    #[arg(long, help = "Also insert the reverse edge of every feature")]
    bidirectional: bool,

    #[arg(
        long = "negate",
        value_name = "KEY",
        action = ArgAction::Append,
        help = "Numeric property negated on reverse edges (repeatable)"
    )]
    negate: Vec<String>,

    #[arg(long, help = "Update an existing u->v edge instead of adding a parallel one")]
    coalesce: bool,

    #[arg(long, help = "Do not store the line geometry in _geometry")]
    no_geometry: bool,

    #[arg(long, help = "Maintain an R*Tree index over nodes and edges")]
    spatial_index: bool,

    #[arg(long, help = "SQLite page cache size (pages)")]
    cache_pages: Option<usize>,

    #[arg(long, value_enum, help = "SQLite synchronous mode")]
    synchronous: Option<SynchronousArg>,

    #[arg(
        long,
        env = "LINEGRAPH_CONFIG",
        value_name = "FILE",
        help = "TOML file with ingestion options; flags override it"
    )]
    config: Option<PathBuf>,

    #[arg(long, short, help = "Hide the progress bar and info logs")]
    quiet: bool,

    #[arg(
        long,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for the run summary"
    )]
    format: OutputFormat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum SynchronousArg {
    Full,
    Normal,
    Off,
}

impl From<SynchronousArg> for Synchronous {
    fn from(mode: SynchronousArg) -> Self {
        match mode {
            SynchronousArg::Full => Synchronous::Full,
            SynchronousArg::Normal => Synchronous::Normal,
            SynchronousArg::Off => Synchronous::Off,
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let mut paths = cli.paths.clone();
    let store = paths.pop().ok_or("missing output store path")?;
    let cfg = IngestConfig {
        inputs: paths,
        store,
        open: build_open_options(&cli),
        ingest: build_ingest_options(&cli)?,
    };

    let bar = if cli.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{prefix} [{bar:40}] {pos}/{len} features ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix("Importing edges");
        bar
    };
    let summary = run_ingest(&cfg, |event| match event {
        IngestProgress::InputOpened { features, .. } => bar.inc_length(features as u64),
        IngestProgress::FeaturesSeen(seen) => bar.set_position(seen),
    });
    bar.finish_and_clear();
    let summary = summary?;

    for failure in &summary.failures {
        eprintln!("warning: skipped {failure}");
    }
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print_summary_text(&summary),
    }
    Ok(())
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "linegraph=warn" } else { "linegraph=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build_open_options(cli: &Cli) -> OpenOptions {
    let mut opts = OpenOptions::default()
        .precision(cli.precision)
        .spatial_index(cli.spatial_index);
    if cli.coalesce {
        opts = opts.duplicate_edges(DuplicateEdges::Coalesce);
    }
    if let Some(pages) = cli.cache_pages {
        opts = opts.cache(CacheMode::Pages(pages));
    }
    if let Some(mode) = cli.synchronous {
        opts = opts.synchronous(mode.into());
    }
    opts
}

fn build_ingest_options(cli: &Cli) -> Result<IngestOptions, Box<dyn Error>> {
    let mut opts = match &cli.config {
        Some(path) => load_ingest_options(path)?,
        None => IngestOptions::default(),
    };
    if let Some(batch_size) = cli.batch_size {
        opts.batch_size = batch_size;
    }
    if cli.bidirectional {
        opts.bidirectional = true;
    }
    opts.reverse_negate.extend(cli.negate.iter().cloned());
    if cli.no_geometry {
        opts.store_geometry = false;
    }
    Ok(opts)
}

fn print_summary_text(summary: &IngestSummary) {
    let verb = if summary.created { "Created" } else { "Updated" };
    println!("{verb} {}", summary.store.display());
    println!(
        "  features: {} read, {} ingested, {} skipped",
        summary.features_seen,
        summary.features_ingested,
        summary.failures.len()
    );
    println!(
        "  edges: {} inserted, {} merged",
        summary.edges_inserted, summary.edges_merged
    );
    println!(
        "  nodes: {} created; store holds {} nodes and {} edges",
        summary.nodes_created, summary.node_count, summary.edge_count
    );
    if !summary.columns_added.is_empty() {
        println!("  new columns: {}", summary.columns_added.join(", "));
    }
}
