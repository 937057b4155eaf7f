//! CLI binary for pdfboard.
//!
//! A thin shim over the library crate: loads a graph document, attaches
//! files to its input nodes, runs it and writes what the output nodes
//! deliver.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdfboard::{
    deliveries, page_range, shared, EngineConfig, ExecutionProgressCallback, FileStore, Graph,
    NodeKind, NodeOutcome, PdfDocument, Planner, ProgressCallback,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the run, one log line per node.
/// Nodes finish out of order when branches run concurrently.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Planning");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self, node_id: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut t| t.remove(node_id))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExecutionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_nodes: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} nodes  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_nodes as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Running");
    }

    fn on_node_start(&self, node_id: &str, kind: &str) {
        if let Ok(mut t) = self.start_times.lock() {
            t.insert(node_id.to_string(), Instant::now());
        }
        self.bar.set_message(format!("{node_id} ({kind})"));
    }

    fn on_node_complete(&self, node_id: &str, outputs: usize) {
        let secs = self.elapsed(node_id);
        self.bar.println(format!(
            "  {} {:<24} {}  {}",
            green("✓"),
            node_id,
            dim(&format!("{outputs} file(s)")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_node_error(&self, node_id: &str, error: &str) {
        let secs = self.elapsed(node_id);
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<24} {}  {}",
            red("✗"),
            node_id,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_nodes: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} nodes ran successfully", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} nodes succeeded  ({} failed)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_nodes,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run a saved graph, attaching a file to input node "in"
  pdfboard run board.json --file in=report.pdf -o out/

  # Several inputs, machine-readable report on stdout
  pdfboard run merge.json --file a=cover.pdf --file b=body.pdf -o out/ --json

  # Page count, sizes and metadata of a PDF
  pdfboard inspect report.pdf

  # How a page-range expression is understood
  pdfboard ranges "1-3, 5, 9-7, x"

GRAPH DOCUMENTS:
  A graph is the JSON form of pdfboard::Graph: {"nodes": [...], "edges": [...]}.
  Input nodes get their file from --file <node-id>=<path>; every output node
  writes its deliveries into the output directory (one subdirectory per
  output node when there is more than one).

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium, used by flatten, pdfToImage, previews
                    and image exports
  RUST_LOG          Overrides the log filter (e.g. pdfboard=debug)
"#;

/// Run PDF/image processing graphs.
#[derive(Parser, Debug)]
#[command(
    name = "pdfboard",
    version,
    about = "Run PDF and image processing graphs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFBOARD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFBOARD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a graph document.
    Run {
        /// Graph JSON file.
        graph: PathBuf,

        /// Attach a file to an input node: <node-id>=<path>. Repeatable.
        #[arg(short, long = "file", value_name = "NODE=PATH")]
        files: Vec<String>,

        /// Directory for output-node deliveries.
        #[arg(short, long, env = "PDFBOARD_OUTPUT", default_value = ".")]
        output: PathBuf,

        /// Maximum transforms running at once.
        #[arg(short, long, env = "PDFBOARD_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Default render scale for flatten (0.25–8).
        #[arg(long, env = "PDFBOARD_RENDER_SCALE", default_value_t = 2.0)]
        render_scale: f32,

        /// Print the run report as JSON on stdout.
        #[arg(long)]
        json: bool,

        /// Disable progress bar.
        #[arg(long, env = "PDFBOARD_NO_PROGRESS")]
        no_progress: bool,
    },

    /// Print page count, page sizes and metadata of a PDF.
    Inspect {
        pdf: PathBuf,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show how a page-range expression is parsed.
    Ranges {
        expr: String,

        /// Only keep pages up to this count.
        #[arg(long)]
        pages: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v is given.
    let show_progress = match &cli.command {
        Command::Run { json, no_progress, .. } => !cli.quiet && !no_progress && !json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Run {
            graph,
            files,
            output,
            concurrency,
            render_scale,
            json,
            ..
        } => {
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn ExecutionProgressCallback>)
            } else {
                None
            };
            let mut builder = EngineConfig::builder().render_scale(render_scale);
            if let Some(n) = concurrency {
                builder = builder.concurrency(n);
            }
            if let Some(cb) = progress {
                builder = builder.progress_callback(cb);
            }
            let config = builder.build().context("Invalid configuration")?;
            run(&graph, &files, &output, config, json, cli.quiet).await
        }
        Command::Inspect { pdf, json } => inspect(&pdf, json).await,
        Command::Ranges { expr, pages } => {
            let indices = page_range::parse_within(&expr, pages.unwrap_or(page_range::MAX_PAGES));
            let one_based: Vec<String> = indices.iter().map(|i| (i + 1).to_string()).collect();
            println!("Pages:      {}", one_based.join(", "));
            println!("Canonical:  {}", page_range::canonical(&indices));
            Ok(())
        }
    }
}

async fn run(
    graph_path: &Path,
    files: &[String],
    out_dir: &Path,
    config: EngineConfig,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let text = tokio::fs::read_to_string(graph_path)
        .await
        .with_context(|| format!("Failed to read graph from {:?}", graph_path))?;
    let mut graph = Graph::from_json(&text).context("Invalid graph document")?;

    let store = FileStore::new();
    for spec in files {
        let (node_id, path) = parse_file_arg(spec)?;
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".into());
        let id = store.add(name, bytes);
        let file = store.get(&id).context("Stored file vanished")?;
        graph
            .assign_input_file(node_id, &file)
            .with_context(|| format!("Cannot attach {:?} to node '{}'", path, node_id))?;
    }

    let graph = shared(graph);
    let planner = Planner::new(config);
    let report = planner.run(&graph, &store).await.context("Run failed")?;

    // ── Deliver output nodes ─────────────────────────────────────────────
    let g = graph.read().await;
    let outputs: Vec<_> = g.nodes().iter().filter(|n| n.kind() == NodeKind::Output).collect();
    let mut written = Vec::new();
    for node in &outputs {
        if report.outcome(&node.id).is_some_and(|o| !o.is_success()) {
            continue;
        }
        let dir = if outputs.len() > 1 {
            let sub = Path::new(&node.id).file_name().with_context(|| {
                format!("Output node id '{}' is not a usable directory name", node.id)
            })?;
            out_dir.join(sub)
        } else {
            out_dir.to_path_buf()
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {:?}", dir))?;
        for delivery in deliveries(&store, node) {
            written.push(delivery.write_to(&dir)?);
        }
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !quiet {
        for path in &written {
            eprintln!("   →  {}", bold(&path.display().to_string()));
        }
        eprintln!(
            "{}  {} succeeded, {} reused, {} failed  {}ms",
            if report.is_clean() { green("✔") } else { cyan("⚠") },
            report.count(NodeOutcome::Succeeded),
            report.count(NodeOutcome::Reused),
            report.count(NodeOutcome::Failed),
            report.duration_ms,
        );
        for failure in report.failures() {
            if let Some(e) = &failure.error {
                eprintln!("   {} {}: {}", red("✗"), failure.id, e);
            }
        }
    }

    if !report.is_clean() {
        anyhow::bail!("{} node(s) failed", report.failures().count());
    }
    Ok(())
}

/// Parse `--file <node>=<path>`.
fn parse_file_arg(spec: &str) -> Result<(&str, PathBuf)> {
    let (node, path) = spec
        .split_once('=')
        .with_context(|| format!("Expected <node-id>=<path>, got '{}'", spec))?;
    let node = node.trim();
    if node.is_empty() || path.trim().is_empty() {
        anyhow::bail!("Expected <node-id>=<path>, got '{}'", spec);
    }
    Ok((node, PathBuf::from(path.trim())))
}

async fn inspect(path: &Path, json: bool) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    let doc = PdfDocument::load(&bytes).context("Failed to parse PDF")?;
    let meta = doc.metadata();
    let sizes = (0..doc.page_count())
        .map(|i| doc.page_size(i))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read page sizes")?;

    if json {
        let value = serde_json::json!({
            "file": path.display().to_string(),
            "pages": doc.page_count(),
            "pageSizes": sizes,
            "encrypted": doc.is_encrypted(),
            "metadata": meta,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise metadata")?
        );
        return Ok(());
    }

    println!("File:         {}", path.display());
    println!("Pages:        {}", doc.page_count());
    if let Some((w, h)) = sizes.first() {
        let uniform = sizes.iter().all(|s| s == &(*w, *h));
        let note = if uniform { "" } else { " (first page)" };
        println!("Page size:    {:.0} x {:.0} pt{}", w, h, note);
    }
    println!("Encrypted:    {}", doc.is_encrypted());
    for (label, value) in [
        ("Title", &meta.title),
        ("Author", &meta.author),
        ("Subject", &meta.subject),
        ("Creator", &meta.creator),
        ("Producer", &meta.producer),
    ] {
        if let Some(v) = value {
            println!("{:<13} {}", format!("{label}:"), v);
        }
    }
    if let Some(k) = meta.keywords.as_ref().filter(|k| !k.is_empty()) {
        println!("Keywords:     {}", k.join(", "));
    }
    Ok(())
}
