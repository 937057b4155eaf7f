//! Transforms that look at what a page *shows*: flatten and blank-page removal.

use super::merge::merge_pdfs;
use super::split::extract;
use super::{artifact, TransformContext, TransformOutput};
use crate::codec::{
    has_image_operator, image_to_single_page_pdf, page_text, render_all_pages_to_raster,
};
use crate::document::PdfDocument;
use crate::error::{BoardError, NodeError};
use crate::graph::FlattenConfig;
use crate::store::{FileArtifact, ImageFormat};
use tracing::{debug, info};

/// Rasterise every page and rebuild the document from the images.
///
/// Text, forms and annotations become pixels; nothing stays selectable.
pub(crate) fn flatten(
    cfg: &FlattenConfig,
    file: &FileArtifact,
    ctx: &TransformContext<'_>,
) -> Result<TransformOutput, NodeError> {
    let scale = cfg.scale.filter(|s| *s > 0.0).unwrap_or(ctx.render_scale);
    let rasters = render_all_pages_to_raster(ctx.renderer, &file.data, scale)?;
    let pages = rasters
        .iter()
        .map(|png| image_to_single_page_pdf(png, ImageFormat::Png))
        .collect::<Result<Vec<_>, BoardError>>()?;
    let docs: Vec<&[u8]> = pages.iter().map(Vec::as_slice).collect();
    let flat = merge_pdfs(&docs)?;
    info!("Flattened {} pages of '{}' at scale {}", pages.len(), file.name, scale);
    Ok(TransformOutput::single(artifact("flat", format!("flat-{}", file.name), flat)))
}

/// Drop pages with no text and no painted image.
///
/// When every page is blank the input is returned byte-for-byte.
pub(crate) fn remove_blank_pages(file: &FileArtifact) -> Result<TransformOutput, NodeError> {
    let doc = PdfDocument::load(&file.data)?;
    let total = doc.page_count();
    let mut keep = Vec::with_capacity(total);
    for index in 0..total {
        let blank = page_text(&doc, index)?.trim().is_empty() && !has_image_operator(&doc, index)?;
        if blank {
            debug!("Page {} is blank", index + 1);
        } else {
            keep.push(index);
        }
    }

    let data = if keep.is_empty() {
        info!("All {} pages of '{}' are blank; keeping the document as is", total, file.name);
        file.data.to_vec()
    } else {
        info!("Removed {} blank pages of {}", total - keep.len(), total);
        extract(&doc, &keep)?
    };
    Ok(TransformOutput::single(artifact("clean", format!("clean-{}", file.name), data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{extract_text, page_has_image};
    use crate::document::draw::tests::png_bytes;
    use crate::document::testutil::{blank_pdf, sample_pdf};
    use crate::transform::testutil::{ctx, file};

    #[test]
    fn flatten_turns_pages_into_images() {
        let doc = file("doc.pdf", sample_pdf(3));
        let out = flatten(&FlattenConfig::default(), &doc, &ctx()).unwrap();
        assert_eq!(out.files[0].name, "flat-doc.pdf");
        let data = &out.files[0].data;
        assert_eq!(PdfDocument::load(data).unwrap().page_count(), 3);
        assert!(extract_text(data).unwrap().lines().all(|l| !l.starts_with("Page")));
        for i in 0..3 {
            assert!(page_has_image(data, i).unwrap());
        }
    }

    #[test]
    fn blank_pages_are_dropped_in_order() {
        let doc = merge_pdfs(&[&sample_pdf(1)[..], &blank_pdf(1)[..], &sample_pdf(2)[..]]).unwrap();
        let out = remove_blank_pages(&file("mixed.pdf", doc)).unwrap();
        assert_eq!(out.files[0].name, "clean-mixed.pdf");
        let text = extract_text(&out.files[0].data).unwrap();
        assert_eq!(
            text,
            "--- Page 1 ---\nPage 1\n\n--- Page 2 ---\nPage 1\n\n--- Page 3 ---\nPage 2\n\n"
        );
    }

    #[test]
    fn image_only_page_is_not_blank() {
        let img = image_to_single_page_pdf(&png_bytes(10, 10, 255), ImageFormat::Png).unwrap();
        let doc = merge_pdfs(&[&blank_pdf(1)[..], &img[..]]).unwrap();
        let out = remove_blank_pages(&file("d.pdf", doc)).unwrap();
        let kept = &out.files[0].data;
        assert_eq!(PdfDocument::load(kept).unwrap().page_count(), 1);
        assert!(page_has_image(kept, 0).unwrap());
    }

    #[test]
    fn all_blank_returns_original_bytes() {
        let original = blank_pdf(2);
        let out = remove_blank_pages(&file("empty.pdf", original.clone())).unwrap();
        assert_eq!(&out.files[0].data[..], &original[..]);
    }
}
