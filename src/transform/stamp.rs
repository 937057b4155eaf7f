//! Overlays drawn onto existing pages: page numbers, watermarks, images.

use super::{artifact, NodeInput, TransformOutput};
use crate::document::{PdfDocument, Rgb, StandardFont, TextOptions};
use crate::error::NodeError;
use crate::graph::ports::{INPUT_IMAGE, INPUT_PDF};
use crate::graph::{AddImageConfig, NumberPosition, PageNumbersConfig, WatermarkConfig};
use crate::store::{FileArtifact, ImageFormat};
use std::collections::HashSet;
use tracing::{debug, info};

const NUMBER_SIZE: f32 = 12.0;
const NUMBER_MARGIN: f32 = 30.0;

const WATERMARK_SIZE: f32 = 50.0;
const WATERMARK_GRAY: f32 = 0.7;
const WATERMARK_OPACITY: f32 = 0.5;
const WATERMARK_ANGLE: f32 = 45.0;

// ── Page numbers ─────────────────────────────────────────────────────────

/// Expand a format preset into a template with `{n}` / `{total}`
/// placeholders. Anything that is not a preset is already a template.
pub fn page_number_template(format: &str) -> &str {
    match format {
        "" | "1" => "{n}",
        "1 / n" => "{n} / {total}",
        "Page 1" => "Page {n}",
        "Page 1 of n" => "Page {n} of {total}",
        custom => custom,
    }
}

pub(crate) fn page_numbers(
    cfg: &PageNumbersConfig,
    file: &FileArtifact,
) -> Result<TransformOutput, NodeError> {
    let mut doc = PdfDocument::load(&file.data)?;
    let total = doc.page_count();
    let first = cfg.start_from_page.unwrap_or(1).max(1);
    let last = cfg.end_at_page.unwrap_or(total);
    let skip: HashSet<usize> = cfg.skip_pages.iter().copied().collect();
    let template = page_number_template(&cfg.format);
    let font = StandardFont::Helvetica;

    let mut number = cfg.start_number;
    let mut labelled = 0;
    for index in 0..total {
        let page = index + 1;
        if page < first || page > last || skip.contains(&page) {
            continue;
        }
        let text = template
            .replace("{n}", &number.to_string())
            .replace("{total}", &total.to_string());
        let (width, height) = doc.page_size(index)?;
        let text_width = PdfDocument::text_width(&text, font, NUMBER_SIZE);

        let x = match cfg.position {
            NumberPosition::BottomCenter | NumberPosition::TopCenter => (width - text_width) / 2.0,
            NumberPosition::BottomRight | NumberPosition::TopRight => {
                width - text_width - NUMBER_MARGIN
            }
            NumberPosition::BottomLeft | NumberPosition::TopLeft => NUMBER_MARGIN,
        };
        let y = match cfg.position {
            NumberPosition::TopCenter | NumberPosition::TopRight | NumberPosition::TopLeft => {
                height - NUMBER_MARGIN - NUMBER_SIZE
            }
            _ => NUMBER_MARGIN,
        };

        let opts = TextOptions {
            size: NUMBER_SIZE,
            font,
            ..TextOptions::at(x, y)
        };
        doc.draw_text(index, &text, &opts)?;
        debug!("Page {} labelled '{}'", page, text);
        number += 1;
        labelled += 1;
    }
    info!("Numbered {} of {} pages", labelled, total);
    Ok(TransformOutput::single(artifact("numbered", "numbered.pdf", doc.save()?)))
}

// ── Watermark ────────────────────────────────────────────────────────────

pub(crate) fn watermark(
    cfg: &WatermarkConfig,
    file: &FileArtifact,
) -> Result<TransformOutput, NodeError> {
    if cfg.text.trim().is_empty() {
        return Err(NodeError::InvalidConfig("watermark text is empty".into()));
    }
    let mut doc = PdfDocument::load(&file.data)?;
    let font = StandardFont::HelveticaBold;
    let text_width = PdfDocument::text_width(&cfg.text, font, WATERMARK_SIZE);
    let text_height = font.height_at_size(WATERMARK_SIZE);

    for index in 0..doc.page_count() {
        let (width, height) = doc.page_size(index)?;
        let opts = TextOptions {
            x: width / 2.0 - text_width / 2.0,
            y: height / 2.0 - text_height / 2.0,
            size: WATERMARK_SIZE,
            font,
            color: Rgb::gray(WATERMARK_GRAY),
            rotation: WATERMARK_ANGLE,
            opacity: Some(WATERMARK_OPACITY),
        };
        doc.draw_text(index, &cfg.text, &opts)?;
    }
    info!("Watermarked {} pages with '{}'", doc.page_count(), cfg.text);
    Ok(TransformOutput::single(artifact("watermarked", "watermarked.pdf", doc.save()?)))
}

// ── Add image ────────────────────────────────────────────────────────────

pub(crate) fn add_image(
    cfg: &AddImageConfig,
    inputs: &[NodeInput],
) -> Result<TransformOutput, NodeError> {
    let on = |handle: &str| {
        inputs
            .iter()
            .find(|i| i.handle.as_deref() == Some(handle))
            .and_then(|i| i.files.first())
            .ok_or_else(|| NodeError::MissingInput(handle.to_string()))
    };
    let pdf = on(INPUT_PDF)?;
    let image = on(INPUT_IMAGE)?;
    let format = ImageFormat::detect(&image.name, &image.data).ok_or_else(|| {
        NodeError::InvalidConfig(format!("'{}' is not a PNG or JPEG image", image.name))
    })?;

    let mut doc = PdfDocument::load(&pdf.data)?;
    let total = doc.page_count();
    if cfg.page_number == 0 || cfg.page_number > total {
        return Err(NodeError::PageOutOfRange {
            page: cfg.page_number,
            total,
        });
    }

    let embedded = doc.embed_image(&image.data, format)?;
    let scale = if cfg.scale > 0.0 { cfg.scale } else { 1.0 };
    let width = cfg.width.unwrap_or(embedded.width as f32 * scale);
    let height = cfg.height.unwrap_or(embedded.height as f32 * scale);
    doc.draw_embedded(cfg.page_number - 1, &embedded, cfg.x, cfg.y, width, height)?;
    info!(
        "Placed '{}' on page {} at ({}, {}) size {}x{}",
        image.name, cfg.page_number, cfg.x, cfg.y, width, height
    );
    Ok(TransformOutput::single(artifact("addimg", format!("img-{}", pdf.name), doc.save()?)))
}
