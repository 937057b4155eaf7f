//! Preview: pass files through and produce a thumbnail of the first one.

use super::{artifact, NodeInput, TransformContext, TransformOutput};
use crate::codec::render_page_to_raster;
use crate::error::NodeError;
use crate::graph::PreviewConfig;
use crate::store::{stem, FileArtifact, FileClass};
use tracing::{debug, warn};

pub(crate) fn preview(
    cfg: &PreviewConfig,
    inputs: &[NodeInput],
    ctx: &TransformContext<'_>,
) -> Result<TransformOutput, NodeError> {
    let files: Vec<FileArtifact> = inputs.iter().flat_map(|i| i.files.iter().cloned()).collect();
    let Some(first) = files.first() else {
        return Err(NodeError::MissingInput(
            inputs.first().map_or_else(|| "no input connected".to_string(), |i| i.source.clone()),
        ));
    };
    let thumbnail = thumbnail(cfg, first, ctx);
    let many = files.len() > 1;
    Ok(TransformOutput {
        files,
        many,
        preview: thumbnail,
    })
}

/// A failed thumbnail never fails the node.
fn thumbnail(
    cfg: &PreviewConfig,
    file: &FileArtifact,
    ctx: &TransformContext<'_>,
) -> Option<FileArtifact> {
    match file.class() {
        FileClass::Image => Some(file.clone()),
        FileClass::Pdf => {
            let page = cfg.page_number.max(1);
            match render_page_to_raster(ctx.renderer, &file.data, page, ctx.preview_scale) {
                Ok(raster) => {
                    debug!(
                        "Preview of '{}' page {} → {}x{}",
                        file.name, page, raster.width, raster.height
                    );
                    let name = format!("{}-preview.png", stem(&file.name));
                    Some(artifact("preview", name, raster.png))
                }
                Err(e) => {
                    warn!("No preview for '{}': {}", file.name, e);
                    None
                }
            }
        }
        FileClass::Text | FileClass::Other => None,
    }
}
