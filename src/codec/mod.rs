//! Conversions between PDFs, rasters and text.
//!
//! Everything here is synchronous and CPU-bound; the planner calls into it
//! from `spawn_blocking`.

pub(crate) mod encode;
mod image_pdf;
pub(crate) mod render;
mod text;

pub use encode::{data_uri, encode_png, stitch_vertical};
pub use image_pdf::{image_to_single_page_pdf, A4};
pub use render::{
    render_all_pages_to_raster, render_page_to_raster, PageRenderer, PdfiumRenderer, Raster,
};
pub use text::{extract_text, has_image_operator, page_has_image, page_text};
