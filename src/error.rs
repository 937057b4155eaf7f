//! Error types for the pdfboard library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BoardError`] — **Fatal / rejected**: a graph mutation that would break
//!   an invariant (cycle, incompatible ports, occupied handle), a document
//!   that cannot be parsed, or a configuration that fails validation. Graph
//!   mutations return it *before* touching any state, so a rejected edit
//!   leaves the graph exactly as it was.
//!
//! * [`NodeError`] — **Per-node**: one transform failed (bad input bytes,
//!   page out of range, missing upstream output). It is stored on the node
//!   and reported in the run report; sibling branches keep executing.
//!
//! ## Why two types?
//!
//! Editing the graph and executing it fail for different audiences. A bad
//! edit is the caller's mistake and must be rejected synchronously; a bad
//! node is data and must be surfaced next to the node that produced it
//! without aborting unrelated work.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfboard library.
///
/// Node-level failures use [`NodeError`] and are stored on the node rather
/// than propagated here.
#[derive(Debug, Error)]
pub enum BoardError {
    // ── Graph mutation errors ─────────────────────────────────────────────
    /// The edge would make a node (transitively) feed itself.
    #[error("Connecting '{source_node}' to '{target}' would create a cycle")]
    CycleDetected { source_node: String, target: String },

    /// Producer and consumer handle classes do not intersect.
    #[error("Incompatible ports: '{source_node}' produces {produced} but '{target}' handle '{handle}' accepts {accepted}")]
    IncompatiblePorts {
        source_node: String,
        target: String,
        handle: String,
        produced: String,
        accepted: String,
    },

    /// Target handle already has a producer.
    #[error("Handle '{handle}' on '{target}' is already connected")]
    PortOccupied { target: String, handle: String },

    /// No node with this id exists in the graph.
    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    /// No edge with this id exists in the graph.
    #[error("Unknown edge '{0}'")]
    UnknownEdge(String),

    /// The node kind does not expose this handle.
    #[error("Node '{node}' has no handle '{handle}'")]
    UnknownHandle { node: String, handle: String },

    /// A node with this id is already present.
    #[error("Node '{0}' already exists")]
    DuplicateNode(String),

    // ── Document errors ───────────────────────────────────────────────────
    /// Bytes are not a well-formed document of the expected kind.
    #[error("Not a valid {expected}: {detail}")]
    Format { expected: &'static str, detail: String },

    /// Page index outside `[1, page_count]`.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Page rasterisation backend could not be bound or failed.
    #[error(
        "Page renderer unavailable: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    RendererUnavailable(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write a delivery to disk.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or node configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BoardError {
    pub(crate) fn pdf(detail: impl std::fmt::Display) -> Self {
        BoardError::Format {
            expected: "PDF",
            detail: detail.to_string(),
        }
    }

    pub(crate) fn image(detail: impl std::fmt::Display) -> Self {
        BoardError::Format {
            expected: "image",
            detail: detail.to_string(),
        }
    }
}

/// A failure of a single node execution.
///
/// Stored on the node (see [`crate::graph::Node::error`]) and in the
/// [`crate::planner::RunReport`]. Never retried: transforms are
/// deterministic, so re-running unchanged inputs reproduces the failure.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum NodeError {
    /// Input bytes are not a valid document of the expected kind.
    #[error("Format error: {0}")]
    Format(String),

    /// Requested page does not exist.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Fewer inputs than the operation needs.
    #[error("Needs at least {needed} input files, got {got}")]
    InsufficientInputs { needed: usize, got: usize },

    /// An upstream producer has no resolved output.
    #[error("Missing input from '{0}'")]
    MissingInput(String),

    /// Node settings fail validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rasterisation failed.
    #[error("Render failed: {0}")]
    Render(String),

    /// Unexpected failure (worker panic, serialisation bug).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<BoardError> for NodeError {
    fn from(e: BoardError) -> Self {
        match e {
            BoardError::Format { .. } => NodeError::Format(e.to_string()),
            BoardError::PageOutOfRange { page, total } => NodeError::PageOutOfRange { page, total },
            BoardError::InvalidConfig(msg) => NodeError::InvalidConfig(msg),
            BoardError::RendererUnavailable(msg) => NodeError::Render(msg),
            other => NodeError::Internal(other.to_string()),
        }
    }
}
