//! Page rasterisation: the [`PageRenderer`] seam and its pdfium backend.
//!
//! ## Why a trait?
//!
//! Rasterising a PDF page means running a full PDF renderer, which here is
//! the native pdfium library. Everything else in the engine is pure Rust.
//! Putting rendering behind a trait keeps the planner and the transforms
//! testable without pdfium on the machine, and lets embedders plug in a
//! different backend.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is CPU-bound and not async-aware. Callers in async contexts run
//! the renderer inside `tokio::task::spawn_blocking` (the planner does this
//! for every transform), so Tokio worker threads never stall on a render.

use crate::codec::encode::encode_png;
use crate::document::PdfDocument;
use crate::error::BoardError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rasterises PDF pages. `scale` 1.0 renders one pixel per point (72 dpi).
pub trait PageRenderer: Send + Sync {
    /// Render 0-based page `index` of `pdf`.
    fn render_page(&self, pdf: &[u8], index: usize, scale: f32) -> Result<DynamicImage, BoardError>;

    /// Render every page, in page order.
    fn render_all(&self, pdf: &[u8], scale: f32) -> Result<Vec<DynamicImage>, BoardError> {
        let total = PdfDocument::load(pdf)?.page_count();
        (0..total).map(|i| self.render_page(pdf, i, scale)).collect()
    }
}

/// A rendered page encoded as PNG.
#[derive(Debug, Clone)]
pub struct Raster {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Render 1-based `page_number` of `pdf` to PNG.
///
/// Fails with [`BoardError::PageOutOfRange`] when the page does not exist.
pub fn render_page_to_raster(
    renderer: &dyn PageRenderer,
    pdf: &[u8],
    page_number: usize,
    scale: f32,
) -> Result<Raster, BoardError> {
    let total = PdfDocument::load(pdf)?.page_count();
    if page_number == 0 || page_number > total {
        return Err(BoardError::PageOutOfRange {
            page: page_number,
            total,
        });
    }
    let img = renderer.render_page(pdf, page_number - 1, scale)?;
    Ok(Raster {
        width: img.width(),
        height: img.height(),
        png: encode_png(&img)?,
    })
}

/// Render every page of `pdf` to PNG, in page order.
pub fn render_all_pages_to_raster(
    renderer: &dyn PageRenderer,
    pdf: &[u8],
    scale: f32,
) -> Result<Vec<Vec<u8>>, BoardError> {
    renderer
        .render_all(pdf, scale)?
        .iter()
        .map(encode_png)
        .collect()
}

/// Renderer backed by the pdfium shared library.
///
/// Library lookup order: an explicit path, then `PDFIUM_LIB_PATH` (file or
/// directory), then the system library search path.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    library: Option<PathBuf>,
}

impl PdfiumRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the pdfium library at `path` (a file, or a directory containing it).
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library: Some(path.into()),
        }
    }

    /// Check that pdfium can be bound, without rendering anything.
    pub fn probe(&self) -> Result<(), BoardError> {
        self.bind().map(|_| ())
    }

    fn bind(&self) -> Result<Pdfium, BoardError> {
        let configured = self
            .library
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match configured {
            Some(path) => Pdfium::bind_to_library(library_file(&path)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| BoardError::RendererUnavailable(e.to_string()))?;
        Ok(Pdfium::new(bindings))
    }
}

fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_page(
        &self,
        pdf: &[u8],
        index: usize,
        scale: f32,
    ) -> Result<DynamicImage, BoardError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| BoardError::pdf(format!("{:?}", e)))?;
        let pages = document.pages();
        let total = pages.len() as usize;
        if index >= total {
            return Err(BoardError::PageOutOfRange {
                page: index + 1,
                total,
            });
        }

        let page = pages
            .get(index as u16)
            .map_err(|e| BoardError::RendererUnavailable(format!("page {}: {:?}", index + 1, e)))?;
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| BoardError::RendererUnavailable(format!("page {}: {:?}", index + 1, e)))?;

        let image = bitmap.as_image();
        debug!("Rendered page {} → {}x{} px", index + 1, image.width(), image.height());
        Ok(image)
    }

    fn render_all(&self, pdf: &[u8], scale: f32) -> Result<Vec<DynamicImage>, BoardError> {
        // One binding and one parse for the whole document.
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| BoardError::pdf(format!("{:?}", e)))?;
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);

        let mut out = Vec::new();
        for (i, page) in document.pages().iter().enumerate() {
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| BoardError::RendererUnavailable(format!("page {}: {:?}", i + 1, e)))?;
            out.push(bitmap.as_image());
        }
        info!("Rendered {} pages at scale {}", out.len(), scale);
        Ok(out)
    }
}
