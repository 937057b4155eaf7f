//! The transform library: one pure function per node kind.
//!
//! [`execute`] is the single registry. It matches exhaustively on
//! [`NodeOp`], so a new kind does not compile until it has a transform.
//!
//! Transforms are synchronous and CPU-bound. They take resolved input
//! artifacts and return freshly minted ones; nothing here touches the graph
//! or the store. The planner runs them inside `spawn_blocking`.
//!
//! ```text
//!  inputs (by handle) ──► execute(op) ──► TransformOutput
//!                          │                ├─ files    (new artifacts, in order)
//!                          │                ├─ many     (list-valued output?)
//!                          │                └─ preview  (optional PNG)
//!                          └─ NodeError on failure
//! ```

mod convert;
pub mod export;
mod merge;
mod metadata;
mod pages;
mod preview;
mod raster;
mod secure;
mod split;
mod stamp;

pub use export::{deliveries, Delivery};
pub use stamp::page_number_template;

use crate::codec::PageRenderer;
use crate::error::NodeError;
use crate::graph::NodeOp;
use crate::store::{FileArtifact, FileId};
use tracing::debug;

/// Artifacts arriving on one target handle, from one producer.
#[derive(Debug, Clone)]
pub struct NodeInput {
    pub handle: Option<String>,
    /// Id of the producing node.
    pub source: String,
    pub files: Vec<FileArtifact>,
}

/// Services a transform may call out to.
pub struct TransformContext<'a> {
    pub renderer: &'a dyn PageRenderer,
    /// Scale for flatten when the node does not set one.
    pub render_scale: f32,
    /// Scale for preview thumbnails.
    pub preview_scale: f32,
}

/// What a transform produced.
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub files: Vec<FileArtifact>,
    /// The node exposes a list even if it has one element.
    pub many: bool,
    pub preview: Option<FileArtifact>,
}

impl TransformOutput {
    pub(crate) fn single(file: FileArtifact) -> Self {
        Self {
            files: vec![file],
            many: false,
            preview: None,
        }
    }

    pub(crate) fn list(files: Vec<FileArtifact>) -> Self {
        Self {
            files,
            many: true,
            preview: None,
        }
    }
}

/// Run the transform for `op` over `inputs`.
pub fn execute(
    op: &NodeOp,
    inputs: &[NodeInput],
    ctx: &TransformContext<'_>,
) -> Result<TransformOutput, NodeError> {
    debug!("Executing {} over {} input(s)", op.kind(), inputs.len());
    match op {
        NodeOp::Input(_) => {
            let files: Vec<FileArtifact> =
                inputs.iter().flat_map(|i| i.files.iter().cloned()).collect();
            if files.is_empty() {
                return Err(NodeError::MissingInput("no file assigned".into()));
            }
            Ok(TransformOutput {
                files,
                many: false,
                preview: None,
            })
        }
        NodeOp::Output(cfg) => export::package(cfg, inputs, ctx),
        NodeOp::Preview(cfg) => preview::preview(cfg, inputs, ctx),
        NodeOp::Merge(_) => merge::merge(inputs),
        NodeOp::Split(cfg) => split::split(cfg, primary(inputs)?),
        NodeOp::Rotate(cfg) => pages::rotate(cfg, primary(inputs)?),
        NodeOp::RemovePages(cfg) => pages::remove_pages(cfg, primary(inputs)?),
        NodeOp::PageNumbers(cfg) => stamp::page_numbers(cfg, primary(inputs)?),
        NodeOp::Watermark(cfg) => stamp::watermark(cfg, primary(inputs)?),
        NodeOp::AddImage(cfg) => stamp::add_image(cfg, inputs),
        NodeOp::Secure(cfg) => secure::secure(cfg, primary(inputs)?),
        NodeOp::Metadata(cfg) => metadata::metadata(cfg, primary(inputs)?),
        NodeOp::ImageToPdf(_) => convert::image_to_pdf(primary(inputs)?),
        NodeOp::PdfToImage(cfg) => convert::pdf_to_image(cfg, primary(inputs)?, ctx),
        NodeOp::PdfToText(_) => convert::pdf_to_text(primary(inputs)?),
        NodeOp::Flatten(cfg) => raster::flatten(cfg, primary(inputs)?, ctx),
        NodeOp::RemoveBlankPages(_) => raster::remove_blank_pages(primary(inputs)?),
    }
}

/// The primary file of the first connected input.
fn primary(inputs: &[NodeInput]) -> Result<&FileArtifact, NodeError> {
    let input = inputs
        .first()
        .ok_or_else(|| NodeError::MissingInput("no input connected".into()))?;
    input
        .files
        .first()
        .ok_or_else(|| NodeError::MissingInput(input.source.clone()))
}

/// A new artifact with a fresh `<prefix>-<uuid>` id.
pub(crate) fn artifact(prefix: &str, name: impl Into<String>, data: Vec<u8>) -> FileArtifact {
    FileArtifact::new(FileId::generate(prefix), name, data)
}
