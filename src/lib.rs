//! # pdfboard
//!
//! Build PDF and image processing pipelines as dataflow graphs, then run
//! them incrementally.
//!
//! ## Why a graph?
//!
//! Document chores are rarely one step: merge two reports, drop the cover
//! page, stamp page numbers, encrypt, export. Expressing them as a graph of
//! small typed transforms keeps every step inspectable and lets an edit in
//! the middle re-run only what it affects. Every node's output stays
//! addressable in the [`FileStore`], so intermediate results can be
//! previewed or exported at any point.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files ──► FileStore
//!             │
//!  Graph ─────┤  edit: add/remove/connect (typed ports, no cycles,
//!             │        drop-on-edge splicing)
//!             ▼
//!  Planner ─ 1. Order     Kahn order over nodes reachable from inputs
//!            2. Gather    resolve upstream output ids from the store
//!            3. Reuse     unchanged config + inputs keep their output
//!            4. Execute   transforms on spawn_blocking, bounded workers
//!            5. Commit    discard stale results, store new artifacts
//!             │
//!             ▼
//!  RunReport / NodeEvent stream ──► Delivery (output nodes → files)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfboard::{shared, EngineConfig, FileStore, Graph, Node, NodeKind, Planner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FileStore::new();
//!     let id = store.add("report.pdf", std::fs::read("report.pdf")?);
//!
//!     let mut graph = Graph::new();
//!     graph.add_node(Node::new("in", NodeKind::Input.default_op()))?;
//!     graph.assign_input_file("in", &store.get(&id).ok_or("file vanished")?)?;
//!     graph.add_node(Node::new("rotate", NodeKind::Rotate.default_op()))?;
//!     graph.add_node(Node::new("out", NodeKind::Output.default_op()))?;
//!     graph.connect("in", "rotate")?;
//!     graph.connect("rotate", "out")?;
//!
//!     let graph = shared(graph);
//!     let planner = Planner::new(EngineConfig::default());
//!     let report = planner.run(&graph, &store).await?;
//!     eprintln!("{} nodes succeeded", report.success_count());
//!
//!     let g = graph.read().await;
//!     for delivery in pdfboard::deliveries(&store, g.node("out").ok_or("no output")?) {
//!         delivery.write_to(std::path::Path::new("out"))?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfboard` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdfboard = { version = "0.1", default-features = false }
//! ```
//!
//! ## Rendering
//!
//! Structural transforms (merge, split, rotate, stamps, metadata, security)
//! are pure Rust on top of `lopdf`. Flatten, pdfToImage, previews and image
//! exports rasterise through a [`PageRenderer`]; the default binds pdfium at
//! runtime. Set `PDFIUM_LIB_PATH` if the library is not installed
//! system-wide, or inject your own renderer via [`EngineConfigBuilder::renderer`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod page_range;
pub mod planner;
pub mod progress;
pub mod store;
pub mod stream;
pub mod transform;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use codec::{PageRenderer, PdfiumRenderer};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use document::PdfDocument;
pub use error::{BoardError, NodeError};
pub use graph::{Edge, Graph, Node, NodeKind, NodeOp, NodeOutput, NodeStatus, SplicePolicy};
pub use page_range::PageRange;
pub use planner::{prune_store, shared, NodeOutcome, NodeReport, Planner, RunReport, SharedGraph};
pub use progress::{ExecutionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{FileArtifact, FileClass, FileId, FileStore};
pub use stream::{run_stream, NodeEvent, NodeEventStream};
pub use transform::{deliveries, Delivery};
