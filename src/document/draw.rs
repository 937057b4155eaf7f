//! Drawing text and raster images onto existing pages.
//!
//! New operators are appended as a separate content stream, and the page's
//! original streams are wrapped in `q … Q` so whatever graphics state they
//! leave behind cannot leak into the overlay.

use super::fonts::{encode_win_ansi, StandardFont};
use super::PdfDocument;
use crate::error::BoardError;
use crate::store::ImageFormat;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegDecoder;
use image::{ExtendedColorType, ImageDecoder};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId, Stream, StringFormat};
use std::io::{Cursor, Write};

/// An RGB colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);

    pub fn gray(level: f32) -> Self {
        Rgb(level, level, level)
    }
}

/// Placement and styling for [`PdfDocument::draw_text`].
#[derive(Debug, Clone)]
pub struct TextOptions {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub font: StandardFont,
    pub color: Rgb,
    /// Counter-clockwise rotation about `(x, y)`, in degrees.
    pub rotation: f32,
    /// Fill opacity in `[0, 1]`; `None` leaves the page default.
    pub opacity: Option<f32>,
}

impl TextOptions {
    /// 12 pt black Helvetica at `(x, y)`.
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            size: 12.0,
            font: StandardFont::Helvetica,
            color: Rgb::BLACK,
            rotation: 0.0,
            opacity: None,
        }
    }
}

/// An image XObject added to a document, ready to be painted.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedImage {
    pub(crate) id: ObjectId,
    /// Natural width in pixels.
    pub width: u32,
    /// Natural height in pixels.
    pub height: u32,
}

impl PdfDocument {
    /// Advance width of `text` in points, from the font's AFM metrics.
    pub fn text_width(text: &str, font: StandardFont, size: f32) -> f32 {
        font.width_of_text_at_size(text, size)
    }

    /// Draw a single line of text on page `index`.
    pub fn draw_text(
        &mut self,
        index: usize,
        text: &str,
        opts: &TextOptions,
    ) -> Result<(), BoardError> {
        let page_id = self.page_id(index)?;
        let font_id = self.font_object(opts.font);
        let font = self.add_resource(page_id, b"Font", "F", font_id)?;

        let mut ops = vec![Operation::new("q", vec![])];
        if let Some(alpha) = opts.opacity {
            let alpha = alpha.clamp(0.0, 1.0);
            let gs_id = self.doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"ExtGState".to_vec())),
                ("ca", Object::Real(alpha)),
                ("CA", Object::Real(alpha)),
            ]));
            let gs = self.add_resource(page_id, b"ExtGState", "GS", gs_id)?;
            ops.push(Operation::new("gs", vec![Object::Name(gs.into_bytes())]));
        }

        let Rgb(r, g, b) = opts.color;
        let (sin, cos) = opts.rotation.to_radians().sin_cos();
        ops.extend([
            Operation::new("rg", vec![r.into(), g.into(), b.into()]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.into_bytes()), opts.size.into()]),
            Operation::new(
                "Tm",
                vec![
                    cos.into(),
                    sin.into(),
                    (-sin).into(),
                    cos.into(),
                    opts.x.into(),
                    opts.y.into(),
                ],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]);
        self.append_content(page_id, ops)
    }

    /// Add an image XObject for `bytes` without painting it.
    pub fn embed_image(
        &mut self,
        bytes: &[u8],
        format: ImageFormat,
    ) -> Result<EmbeddedImage, BoardError> {
        let (stream, width, height) = match format {
            ImageFormat::Jpg => jpeg_xobject(bytes)?,
            ImageFormat::Png => self.png_xobject(bytes)?,
        };
        let id = self.doc.add_object(stream);
        Ok(EmbeddedImage { id, width, height })
    }

    /// Paint an embedded image into the rectangle `(x, y, width, height)`.
    pub fn draw_embedded(
        &mut self,
        index: usize,
        image: &EmbeddedImage,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), BoardError> {
        let page_id = self.page_id(index)?;
        let name = self.add_resource(page_id, b"XObject", "Im", image.id)?;
        self.append_content(
            page_id,
            vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![width.into(), 0.into(), 0.into(), height.into(), x.into(), y.into()],
                ),
                Operation::new("Do", vec![Object::Name(name.into_bytes())]),
                Operation::new("Q", vec![]),
            ],
        )
    }

    /// Embed and paint an image in one step.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_image(
        &mut self,
        index: usize,
        bytes: &[u8],
        format: ImageFormat,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), BoardError> {
        let image = self.embed_image(bytes, format)?;
        self.draw_embedded(index, &image, x, y, width, height)
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn font_object(&mut self, font: StandardFont) -> ObjectId {
        if let Some(&id) = self.fonts.get(&font) {
            return id;
        }
        let id = self.doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(font.base_font().as_bytes().to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ]));
        self.fonts.insert(font, id);
        id
    }

    /// Register `target` under `/Resources/<category>` of the page and
    /// return the resource name. Reuses an existing entry for the same object.
    fn add_resource(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
        prefix: &str,
        target: ObjectId,
    ) -> Result<String, BoardError> {
        let mut entries = self.category_dict(page_id, category);
        for (key, value) in entries.iter() {
            if value.as_reference().ok() == Some(target) {
                return Ok(String::from_utf8_lossy(key).into_owned());
            }
        }
        let name = (1..)
            .map(|n| format!("{prefix}{n}"))
            .find(|candidate| !entries.has(candidate.as_bytes()))
            .unwrap_or_else(|| prefix.to_string());
        entries.set(name.clone(), Object::Reference(target));

        let resources = self.page_resources_mut(page_id)?;
        resources.set(category.to_vec(), Object::Dictionary(entries));
        Ok(name)
    }

    /// Resolved copy of one resource category, empty when absent.
    fn category_dict(&self, page_id: ObjectId, category: &[u8]) -> Dictionary {
        let Some(resources) = self.inherited(page_id, b"Resources") else {
            return Dictionary::new();
        };
        let Ok(resources) = self.resolve(&resources).as_dict() else {
            return Dictionary::new();
        };
        resources
            .get(category)
            .ok()
            .and_then(|o| self.resolve(o).as_dict().ok())
            .cloned()
            .unwrap_or_default()
    }

    /// Mutable resource dictionary for the page, materialising an inherited
    /// or missing one onto the page first.
    fn page_resources_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary, BoardError> {
        let own = self
            .doc
            .get_dictionary(page_id)
            .map_err(BoardError::pdf)?
            .get(b"Resources")
            .ok()
            .cloned();

        match own {
            Some(Object::Reference(id)) if self.doc.get_dictionary(id).is_ok() => {
                self.doc.get_dictionary_mut(id).map_err(BoardError::pdf)
            }
            Some(Object::Dictionary(_)) => self.own_resources(page_id),
            _ => {
                let inherited = self
                    .inherited(page_id, b"Resources")
                    .and_then(|o| self.resolve(&o).as_dict().ok().cloned())
                    .unwrap_or_default();
                self.page_dict_mut(page_id)?
                    .set("Resources", Object::Dictionary(inherited));
                self.own_resources(page_id)
            }
        }
    }

    fn own_resources(&mut self, page_id: ObjectId) -> Result<&mut Dictionary, BoardError> {
        self.page_dict_mut(page_id)?
            .get_mut(b"Resources")
            .and_then(Object::as_dict_mut)
            .map_err(BoardError::pdf)
    }

    /// Append operators after the page's existing content.
    fn append_content(&mut self, page_id: ObjectId, ops: Vec<Operation>) -> Result<(), BoardError> {
        let body = Content { operations: ops }
            .encode()
            .map_err(|e| BoardError::Internal(format!("content encoding failed: {}", e)))?;

        let existing: Vec<Object> = {
            let page = self.doc.get_dictionary(page_id).map_err(BoardError::pdf)?;
            match page.get(b"Contents") {
                Ok(Object::Array(items)) => items.clone(),
                Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                    Ok(Object::Array(items)) => items.clone(),
                    Ok(_) => vec![Object::Reference(*id)],
                    Err(_) => vec![],
                },
                _ => vec![],
            }
        };

        let contents = if existing.is_empty() {
            let id = self.doc.add_object(Stream::new(Dictionary::new(), body));
            vec![Object::Reference(id)]
        } else {
            let pre = self.doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let mut tail = b"\nQ\n".to_vec();
            tail.extend_from_slice(&body);
            let post = self.doc.add_object(Stream::new(Dictionary::new(), tail));
            let mut all = Vec::with_capacity(existing.len() + 2);
            all.push(Object::Reference(pre));
            all.extend(existing);
            all.push(Object::Reference(post));
            all
        };
        self.page_dict_mut(page_id)?
            .set("Contents", Object::Array(contents));
        Ok(())
    }

    fn png_xobject(&mut self, bytes: &[u8]) -> Result<(Stream, u32, u32), BoardError> {
        let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
            .map_err(BoardError::image)?;
        let (width, height) = (img.width(), img.height());

        let mut dict = image_dict(width, height, "DeviceRGB");
        dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));

        if img.color().has_alpha() {
            let alpha: Vec<u8> = img.to_rgba8().pixels().map(|p| p[3]).collect();
            let mut mask_dict = image_dict(width, height, "DeviceGray");
            mask_dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
            let mask_id = self.doc.add_object(Stream::new(mask_dict, deflate(&alpha)?));
            dict.set("SMask", Object::Reference(mask_id));
        }

        let rgb = img.to_rgb8();
        Ok((Stream::new(dict, deflate(rgb.as_raw())?), width, height))
    }
}

fn jpeg_xobject(bytes: &[u8]) -> Result<(Stream, u32, u32), BoardError> {
    let decoder = JpegDecoder::new(Cursor::new(bytes)).map_err(BoardError::image)?;
    let (width, height) = decoder.dimensions();
    let color_space = match decoder.original_color_type() {
        ExtendedColorType::L8 => "DeviceGray",
        ExtendedColorType::Cmyk8 => "DeviceCMYK",
        _ => "DeviceRGB",
    };
    let mut dict = image_dict(width, height, color_space);
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
    // Already compressed; keep lopdf from deflating it again.
    let mut stream = Stream::new(dict, bytes.to_vec());
    stream.allows_compression = false;
    Ok((stream, width, height))
}

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    Dictionary::from_iter([
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(i64::from(width))),
        ("Height", Object::Integer(i64::from(height))),
        ("ColorSpace", Object::Name(color_space.as_bytes().to_vec())),
        ("BitsPerComponent", Object::Integer(8)),
    ])
}

fn deflate(raw: &[u8]) -> Result<Vec<u8>, BoardError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(raw)
        .and_then(|_| encoder.finish())
        .map_err(|e| BoardError::Internal(format!("deflate failed: {}", e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::super::testutil::*;
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    pub fn png_bytes(w: u32, h: u32, alpha: u8) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, alpha])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
        buf
    }

    pub fn jpeg_bytes(w: u32, h: u32) -> Vec<u8> {
        let pixels = image::RgbImage::from_pixel(w, h, image::Rgb([200, 10, 10]));
        let img = DynamicImage::ImageRgb8(pixels);
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg).unwrap();
        buf
    }

    #[test]
    fn drawn_text_is_extractable() {
        let mut doc = PdfDocument::load(&blank_pdf(1)).unwrap();
        doc.draw_text(0, "Hello overlay", &TextOptions::at(50.0, 50.0)).unwrap();
        let text = crate::codec::extract_text(&doc.save().unwrap()).unwrap();
        assert!(text.contains("Hello overlay"), "got: {text}");
    }

    #[test]
    fn overlay_keeps_original_content() {
        let mut doc = PdfDocument::load(&sample_pdf(1)).unwrap();
        let mut opts = TextOptions::at(10.0, 10.0);
        opts.opacity = Some(0.5);
        opts.rotation = 45.0;
        opts.font = StandardFont::HelveticaBold;
        doc.draw_text(0, "DRAFT", &opts).unwrap();
        let text = crate::codec::extract_text(&doc.save().unwrap()).unwrap();
        assert!(text.contains("---\nPage 1") && text.contains("DRAFT"), "got: {text}");
    }

    #[test]
    fn png_with_alpha_gets_soft_mask() {
        let mut doc = PdfDocument::load(&blank_pdf(1)).unwrap();
        let img = doc.embed_image(&png_bytes(4, 3, 128), ImageFormat::Png).unwrap();
        assert_eq!((img.width, img.height), (4, 3));
        let dict = doc.doc.get_object(img.id).unwrap().as_stream().unwrap().dict.clone();
        assert!(dict.has(b"SMask"));
    }

    #[test]
    fn jpeg_is_embedded_as_dct() {
        let mut doc = PdfDocument::load(&blank_pdf(1)).unwrap();
        let jpg = jpeg_bytes(8, 6);
        doc.draw_image(0, &jpg, ImageFormat::Jpg, 0.0, 0.0, 80.0, 60.0).unwrap();
        let bytes = doc.save().unwrap();
        assert!(crate::codec::page_has_image(&bytes, 0).unwrap());
    }

    #[test]
    fn garbage_image_is_a_format_error() {
        let mut doc = PdfDocument::load(&blank_pdf(1)).unwrap();
        assert!(matches!(
            doc.embed_image(b"nope", ImageFormat::Png),
            Err(BoardError::Format { .. })
        ));
    }
}
