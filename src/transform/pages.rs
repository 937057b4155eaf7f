//! Page-level edits: rotation and removal.

use super::{artifact, TransformOutput};
use crate::document::PdfDocument;
use crate::error::NodeError;
use crate::graph::{RemovePagesConfig, RotateConfig};
use crate::store::FileArtifact;
use tracing::info;

pub(crate) fn rotate(
    cfg: &RotateConfig,
    file: &FileArtifact,
) -> Result<TransformOutput, NodeError> {
    if !matches!(cfg.degrees, 90 | 180 | 270) {
        return Err(NodeError::InvalidConfig(format!(
            "rotation must be 90, 180 or 270 degrees, got {}",
            cfg.degrees
        )));
    }
    let mut doc = PdfDocument::load(&file.data)?;
    let total = doc.page_count();
    let indices: Vec<usize> = match &cfg.pages {
        Some(range) if !range.is_blank() => range.to_indices(total),
        _ => (0..total).collect(),
    };
    for &i in &indices {
        doc.set_rotation(i, cfg.degrees)?;
    }
    info!("Rotated {} of {} pages by {}°", indices.len(), total, cfg.degrees);
    Ok(TransformOutput::single(artifact("rotated", "rotated.pdf", doc.save()?)))
}

pub(crate) fn remove_pages(
    cfg: &RemovePagesConfig,
    file: &FileArtifact,
) -> Result<TransformOutput, NodeError> {
    let mut doc = PdfDocument::load(&file.data)?;
    let total = doc.page_count();
    let mut indices = cfg.pages.to_indices(total);
    // Highest first, so earlier removals never shift later indices.
    indices.sort_unstable_by(|a, b| b.cmp(a));
    for &i in &indices {
        doc.remove_page(i)?;
    }
    info!("Removed {} of {} pages", indices.len(), total);
    Ok(TransformOutput::single(artifact("removed", "processed.pdf", doc.save()?)))
}
