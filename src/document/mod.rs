//! In-memory PDF document model built on `lopdf`.
//!
//! [`PdfDocument`] is the unit every PDF transform works on: load bytes,
//! mutate pages, save bytes. Nothing here performs I/O; all state lives in
//! the wrapped `lopdf::Document` until [`PdfDocument::save`].
//!
//! ## Why lopdf and not pdfium for surgery?
//!
//! pdfium is excellent at *drawing* pages but its editing surface is narrow
//! and it needs a native library at runtime. Page-tree surgery, resource
//! dictionaries, metadata and the standard security handler are all plain
//! object-graph edits, which lopdf exposes directly and which keep the
//! structural transforms pure Rust and testable without pdfium installed.
//!
//! Page indices are 0-based throughout this module.

pub(crate) mod draw;
pub mod fonts;
mod metadata;
mod pages;
mod security;

pub use draw::{EmbeddedImage, Rgb, TextOptions};
pub use fonts::StandardFont;
pub use metadata::Metadata;
pub use pages::PageRef;
pub use security::{Permissions, Printing};

use crate::error::BoardError;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use tracing::debug;

/// Attributes a page inherits from its ancestors in the page tree.
pub(crate) const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// US Letter, used when neither the page nor its ancestors carry a MediaBox.
const DEFAULT_MEDIA_BOX: (f32, f32) = (612.0, 792.0);

static NULL: Object = Object::Null;

/// A loaded, mutable PDF document.
pub struct PdfDocument {
    pub(crate) doc: Document,
    /// Standard fonts already embedded by [`PdfDocument::draw_text`].
    pub(crate) fonts: HashMap<StandardFont, ObjectId>,
}

impl PdfDocument {
    /// Parse `bytes` as a PDF.
    pub fn load(bytes: &[u8]) -> Result<Self, BoardError> {
        if !bytes.starts_with(b"%PDF") && !bytes.windows(5).take(1024).any(|w| w == b"%PDF-") {
            return Err(BoardError::pdf("missing %PDF header"));
        }
        let doc = Document::load_mem(bytes).map_err(BoardError::pdf)?;
        // Resolving the page tree up front turns a broken catalog into a
        // load error instead of a surprise in the first transform.
        doc.catalog().map_err(BoardError::pdf)?;
        debug!("Loaded PDF: {} pages, {} objects", doc.get_pages().len(), doc.objects.len());
        Ok(Self {
            doc,
            fonts: HashMap::new(),
        })
    }

    /// An empty document with a page tree and no pages.
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(vec![])),
                ("Count", Object::Integer(0)),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        Self {
            doc,
            fonts: HashMap::new(),
        }
    }

    /// Serialise the document.
    pub fn save(mut self) -> Result<Vec<u8>, BoardError> {
        self.doc.prune_objects();
        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| BoardError::Internal(format!("PDF serialisation failed: {}", e)))?;
        Ok(buf)
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Object ids of all pages, in page order.
    pub(crate) fn page_ids(&self) -> Vec<ObjectId> {
        self.doc.get_pages().into_values().collect()
    }

    pub(crate) fn page_id(&self, index: usize) -> Result<ObjectId, BoardError> {
        let ids = self.page_ids();
        ids.get(index).copied().ok_or(BoardError::PageOutOfRange {
            page: index + 1,
            total: ids.len(),
        })
    }

    /// Page size in points, `(width, height)`, from the (inherited) MediaBox.
    pub fn page_size(&self, index: usize) -> Result<(f32, f32), BoardError> {
        let page_id = self.page_id(index)?;
        let Some(mb) = self.inherited(page_id, b"MediaBox") else {
            return Ok(DEFAULT_MEDIA_BOX);
        };
        let values: Vec<f32> = match self.resolve(&mb) {
            Object::Array(items) => items.iter().filter_map(|o| number(self.resolve(o))).collect(),
            _ => vec![],
        };
        match values.as_slice() {
            [x0, y0, x1, y1] => Ok(((x1 - x0).abs(), (y1 - y0).abs())),
            _ => Ok(DEFAULT_MEDIA_BOX),
        }
    }

    /// Page rotation in degrees, one of 0, 90, 180, 270.
    pub fn page_rotation(&self, index: usize) -> Result<u16, BoardError> {
        let page_id = self.page_id(index)?;
        let raw = self
            .inherited(page_id, b"Rotate")
            .and_then(|o| number(self.resolve(&o)))
            .unwrap_or(0.0);
        Ok(normalize_rotation(raw as f64))
    }

    /// Compose `delta` degrees with the page's current rotation.
    pub fn set_rotation(&mut self, index: usize, delta: i32) -> Result<u16, BoardError> {
        let current = self.page_rotation(index)?;
        let next = normalize_rotation(current as f64 + delta as f64);
        let page_id = self.page_id(index)?;
        self.page_dict_mut(page_id)?
            .set("Rotate", Object::Integer(i64::from(next)));
        Ok(next)
    }

    // ── Object helpers ────────────────────────────────────────────────────

    /// Follow references until a direct object is reached.
    pub(crate) fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        let mut cur = obj;
        // Bounded: a reference loop in a malformed file must not hang us.
        for _ in 0..32 {
            match cur {
                Object::Reference(id) => match self.doc.get_object(*id) {
                    Ok(next) => cur = next,
                    Err(_) => return &NULL,
                },
                _ => return cur,
            }
        }
        &NULL
    }

    /// Look up `key` on the page, walking up `/Parent` links.
    pub(crate) fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut node = page_id;
        for _ in 0..64 {
            let dict = self.doc.get_dictionary(node).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value.clone());
            }
            node = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        }
        None
    }

    pub(crate) fn page_dict_mut(
        &mut self,
        page_id: ObjectId,
    ) -> Result<&mut Dictionary, BoardError> {
        self.doc
            .get_dictionary_mut(page_id)
            .map_err(|e| BoardError::pdf(format!("page {:?}: {}", page_id, e)))
    }

    /// Id of the root `/Pages` node.
    pub(crate) fn pages_root(&self) -> Result<ObjectId, BoardError> {
        self.doc
            .catalog()
            .and_then(|c| c.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(BoardError::pdf)
    }

    /// Append a blank page of the given size; returns its index.
    pub fn add_blank_page(&mut self, width: f32, height: f32) -> Result<usize, BoardError> {
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let page_id = self.doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(width),
                    Object::Real(height),
                ]),
            ),
            ("Resources", Object::Dictionary(Dictionary::new())),
            ("Contents", Object::Reference(content_id)),
        ]));
        self.add_page(PageRef(page_id))?;
        Ok(self.page_count() - 1)
    }
}

impl Default for PdfDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Numeric value of an `Integer` or `Real` object.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

/// Round to the nearest multiple of 90 and wrap into `[0, 360)`.
pub fn normalize_rotation(degrees: f64) -> u16 {
    let quarter = (degrees / 90.0).round() as i64;
    (quarter * 90).rem_euclid(360) as u16
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use lopdf::content::{Content, Operation};

    /// A document with `n` Letter pages, each showing "Page k" in Helvetica.
    pub fn sample_pdf(n: usize) -> Vec<u8> {
        let mut doc = PdfDocument::new();
        for k in 1..=n {
            let idx = doc.add_blank_page(612.0, 792.0).unwrap();
            doc.draw_text(idx, &format!("Page {k}"), &TextOptions::at(72.0, 700.0)).unwrap();
        }
        doc.save().unwrap()
    }

    /// A document whose single page has an empty content stream.
    pub fn blank_pdf(n: usize) -> Vec<u8> {
        let mut doc = PdfDocument::new();
        for _ in 0..n {
            doc.add_blank_page(300.0, 400.0).unwrap();
        }
        doc.save().unwrap()
    }

    /// Page tree with MediaBox and Rotate set on the `/Pages` node only.
    pub fn inherited_attrs_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content = Content {
            operations: vec![Operation::new("BT", vec![]), Operation::new("ET", vec![])],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
        ]));
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(vec![Object::Reference(page_id)])),
                ("Count", Object::Integer(1)),
                (
                    "MediaBox",
                    Object::Array(vec![0.into(), 0.into(), 200.into(), 100.into()]),
                ),
                ("Rotate", Object::Integer(90)),
                ("Resources", Object::Dictionary(Dictionary::new())),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    /// Open an encrypted PDF with `password`.
    ///
    /// Returns the `/P` permission value recorded in the encryption
    /// dictionary and the decrypted document.
    pub fn open_encrypted(bytes: &[u8], password: &str) -> (i64, lopdf::Document) {
        let mut doc = lopdf::Document::load_mem(bytes).unwrap();
        let p = {
            let dict = match doc.trailer.get(b"Encrypt").unwrap() {
                lopdf::Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
                lopdf::Object::Dictionary(d) => d,
                other => panic!("unexpected /Encrypt entry: {other:?}"),
            };
            dict.get(b"P").unwrap().as_i64().unwrap()
        };
        doc.decrypt(password).unwrap();
        (p, doc)
    }
}
