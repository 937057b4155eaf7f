//! Raster encoding: `DynamicImage` → PNG bytes, and `data:` URIs for previews.
//!
//! PNG is used for every raster the engine produces. Rendered pages are
//! mostly text and flat colour, where lossless compression is both smaller
//! and sharper than JPEG.

use crate::error::BoardError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GenericImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, BoardError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| BoardError::Internal(format!("PNG encoding failed: {}", e)))?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Wrap raster bytes in a base64 `data:` URI.
pub fn data_uri(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Stack images top to bottom on a transparent canvas as wide as the widest.
pub fn stitch_vertical(images: &[DynamicImage]) -> Result<DynamicImage, BoardError> {
    let width = images.iter().map(DynamicImage::width).max().unwrap_or(0);
    let height: u32 = images.iter().map(DynamicImage::height).sum();
    if width == 0 || height == 0 {
        return Err(BoardError::InvalidConfig("nothing to stitch".into()));
    }
    let mut canvas = RgbaImage::new(width, height);
    let mut y = 0;
    for img in images {
        canvas
            .copy_from(&img.to_rgba8(), 0, y)
            .map_err(|e| BoardError::Internal(format!("stitch failed: {}", e)))?;
        y += img.height();
    }
    Ok(DynamicImage::ImageRgba8(canvas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn encode_small_image() {
        let png = encode_png(&solid(10, 10)).expect("encode should succeed");
        assert!(png.starts_with(b"\x89PNG"));
    }

    #[test]
    fn data_uri_round_trips_base64() {
        let uri = data_uri(b"abc", "image/png");
        let b64 = uri.strip_prefix("data:image/png;base64,").unwrap();
        assert_eq!(STANDARD.decode(b64).unwrap(), b"abc");
    }

    #[test]
    fn stitch_uses_max_width_and_total_height() {
        let out = stitch_vertical(&[solid(10, 4), solid(6, 5)]).unwrap();
        assert_eq!((out.width(), out.height()), (10, 9));
    }

    #[test]
    fn stitch_of_nothing_fails() {
        assert!(stitch_vertical(&[]).is_err());
    }
}
