//! Format conversions: image → PDF, PDF page → PNG, PDF → plain text.

use super::{artifact, TransformContext, TransformOutput};
use crate::codec::{extract_text, image_to_single_page_pdf, render_page_to_raster};
use crate::error::NodeError;
use crate::graph::PdfToImageConfig;
use crate::store::{stem, FileArtifact, ImageFormat};
use tracing::info;

pub(crate) fn image_to_pdf(file: &FileArtifact) -> Result<TransformOutput, NodeError> {
    let format = ImageFormat::detect(&file.name, &file.data)
        .ok_or_else(|| {
            NodeError::InvalidConfig(format!("'{}' is not a PNG or JPEG image", file.name))
        })?;
    let pdf = image_to_single_page_pdf(&file.data, format)?;
    info!("Converted image '{}' to PDF", file.name);
    Ok(TransformOutput::single(artifact("img2pdf", format!("{}.pdf", file.name), pdf)))
}

/// The rendered page doubles as the node's preview.
pub(crate) fn pdf_to_image(
    cfg: &PdfToImageConfig,
    file: &FileArtifact,
    ctx: &TransformContext<'_>,
) -> Result<TransformOutput, NodeError> {
    let scale = if cfg.scale > 0.0 { cfg.scale } else { 2.0 };
    let raster = render_page_to_raster(ctx.renderer, &file.data, cfg.page_number, scale)?;
    info!(
        "Rendered page {} of '{}' → {}x{} px",
        cfg.page_number, file.name, raster.width, raster.height
    );
    let name = format!("{}-page{}.png", file.name, cfg.page_number);
    let image = artifact("pdf2img", name, raster.png);
    Ok(TransformOutput {
        preview: Some(image.clone()),
        ..TransformOutput::single(image)
    })
}

pub(crate) fn pdf_to_text(file: &FileArtifact) -> Result<TransformOutput, NodeError> {
    let text = extract_text(&file.data)?;
    info!("Extracted {} chars of text from '{}'", text.len(), file.name);
    Ok(TransformOutput::single(artifact(
        "pdf2text",
        format!("{}.txt", stem(&file.name)),
        text.into_bytes(),
    )))
}
