//! Metadata: write the document-info fields the user filled in.

use super::{artifact, TransformOutput};
use crate::document::PdfDocument;
use crate::error::NodeError;
use crate::graph::MetadataConfig;
use crate::store::FileArtifact;
use tracing::info;

pub(crate) fn metadata(
    cfg: &MetadataConfig,
    file: &FileArtifact,
) -> Result<TransformOutput, NodeError> {
    let mut doc = PdfDocument::load(&file.data)?;
    let fields = cfg.to_metadata();
    doc.set_metadata(&fields)?;
    info!("Updated metadata of '{}'", file.name);
    Ok(TransformOutput::single(artifact("meta", format!("meta-{}", file.name), doc.save()?)))
}
