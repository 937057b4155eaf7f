//! Raster image → single-page PDF.

use crate::document::PdfDocument;
use crate::error::BoardError;
use crate::store::ImageFormat;
use tracing::debug;

/// ISO A4 in points.
pub const A4: (f32, f32) = (595.28, 841.89);

/// Place an image on a fresh A4 page.
///
/// The image is drawn at its natural size (one pixel per point), scaled
/// down uniformly only when it does not fit, and centred on the page.
pub fn image_to_single_page_pdf(bytes: &[u8], format: ImageFormat) -> Result<Vec<u8>, BoardError> {
    let mut doc = PdfDocument::new();
    let (page_w, page_h) = A4;
    let page = doc.add_blank_page(page_w, page_h)?;
    let image = doc.embed_image(bytes, format)?;

    let (w, h) = (image.width as f32, image.height as f32);
    let scale = if w > page_w || h > page_h {
        (page_w / w).min(page_h / h)
    } else {
        1.0
    };
    let (dw, dh) = (w * scale, h * scale);
    doc.draw_embedded(page, &image, (page_w - dw) / 2.0, (page_h - dh) / 2.0, dw, dh)?;
    debug!("Image {}x{} px → A4 page at scale {:.3}", image.width, image.height, scale);
    doc.save()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::draw::tests::{jpeg_bytes, png_bytes};

    #[test]
    fn small_image_produces_one_a4_page() {
        let pdf = image_to_single_page_pdf(&png_bytes(20, 10, 255), ImageFormat::Png).unwrap();
        let doc = PdfDocument::load(&pdf).unwrap();
        assert_eq!(doc.page_count(), 1);
        let (w, h) = doc.page_size(0).unwrap();
        assert!((w - A4.0).abs() < 0.01 && (h - A4.1).abs() < 0.01);
        assert!(crate::codec::page_has_image(&pdf, 0).unwrap());
    }

    #[test]
    fn jpeg_is_accepted() {
        let pdf = image_to_single_page_pdf(&jpeg_bytes(900, 1200), ImageFormat::Jpg).unwrap();
        assert_eq!(PdfDocument::load(&pdf).unwrap().page_count(), 1);
    }

    #[test]
    fn garbage_is_a_format_error() {
        assert!(matches!(
            image_to_single_page_pdf(b"not an image", ImageFormat::Jpg),
            Err(BoardError::Format { .. })
        ));
    }
}
