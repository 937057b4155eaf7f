//! Text extraction and image detection over page content streams.
//!
//! Extraction walks each page's content operators, tracking the text and
//! graphics matrices just far enough to know where every text-showing
//! operator starts. Fragments are then put into visual order (top to
//! bottom, then left to right) and joined with single spaces.
//!
//! Glyph advances are not tracked, so several `Tj`s on one line that share
//! an origin keep their content-stream order.

use crate::document::{number, PdfDocument};
use crate::error::BoardError;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object};
use std::fmt::Write as _;

/// Fragments whose baselines differ by less than this share a line.
const LINE_TOLERANCE: f32 = 2.0;
/// A `TJ` adjustment this negative (thousandths of an em) reads as a space.
const TJ_SPACE_THRESHOLD: f32 = -250.0;
const MAX_FORM_DEPTH: usize = 8;

/// All text of `pdf`, one `--- Page N ---` section per page.
pub fn extract_text(pdf: &[u8]) -> Result<String, BoardError> {
    let doc = PdfDocument::load(pdf)?;
    let mut out = String::new();
    for i in 0..doc.page_count() {
        let _ = write!(out, "--- Page {} ---\n{}\n\n", i + 1, page_text(&doc, i)?);
    }
    Ok(out)
}

/// Text of 0-based page `index` in visual order.
pub fn page_text(doc: &PdfDocument, index: usize) -> Result<String, BoardError> {
    let content = page_content(doc, index)?;
    let mut walker = TextWalker::default();
    for op in &content.operations {
        walker.apply(op);
    }
    Ok(visual_order(walker.fragments).join(" "))
}

/// Whether 0-based page `index` of `pdf` paints any raster image.
pub fn page_has_image(pdf: &[u8], index: usize) -> Result<bool, BoardError> {
    let doc = PdfDocument::load(pdf)?;
    has_image_operator(&doc, index)
}

/// Whether the page paints an image XObject (directly or inside a form
/// XObject) or an inline image.
pub fn has_image_operator(doc: &PdfDocument, index: usize) -> Result<bool, BoardError> {
    let content = page_content(doc, index)?;
    let page_id = doc.page_id(index)?;
    let resources = doc
        .inherited(page_id, b"Resources")
        .and_then(|r| doc.resolve(&r).as_dict().ok().cloned())
        .unwrap_or_default();
    Ok(paints_image(doc, &content.operations, &resources, 0))
}

fn page_content(doc: &PdfDocument, index: usize) -> Result<Content, BoardError> {
    let page_id = doc.page_id(index)?;
    doc.doc
        .get_and_decode_page_content(page_id)
        .map_err(|e| BoardError::pdf(format!("page {} content: {}", index + 1, e)))
}

fn paints_image(
    doc: &PdfDocument,
    ops: &[Operation],
    resources: &Dictionary,
    depth: usize,
) -> bool {
    if depth > MAX_FORM_DEPTH {
        return false;
    }
    let xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| doc.resolve(o).as_dict().ok());

    for op in ops {
        match op.operator.as_str() {
            "BI" | "ID" | "EI" => return true,
            "Do" => {
                let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                    continue;
                };
                let Some(stream) = xobjects
                    .and_then(|x| x.get(name).ok())
                    .and_then(|o| doc.resolve(o).as_stream().ok())
                else {
                    continue;
                };
                match stream.dict.get(b"Subtype").and_then(Object::as_name) {
                    Ok(b"Image") => return true,
                    Ok(b"Form") => {
                        let raw = stream
                            .decompressed_content()
                            .unwrap_or_else(|_| stream.content.clone());
                        let Ok(inner) = Content::decode(&raw) else {
                            continue;
                        };
                        let form_resources = stream
                            .dict
                            .get(b"Resources")
                            .ok()
                            .and_then(|o| doc.resolve(o).as_dict().ok())
                            .unwrap_or(resources);
                        if paints_image(doc, &inner.operations, form_resources, depth + 1) {
                            return true;
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
    false
}

// ── Text state ───────────────────────────────────────────────────────────

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let v: Vec<f32> = operands.iter().filter_map(number).collect();
        <[f32; 6]>::try_from(v.as_slice()).ok().map(Matrix)
    }

    /// `self × other`.
    fn then(self, other: Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn origin(self) -> (f32, f32) {
        (self.0[4], self.0[5])
    }
}

#[derive(Debug, Clone)]
struct Fragment {
    x: f32,
    y: f32,
    text: String,
}

#[derive(Debug)]
struct TextWalker {
    ctm: Matrix,
    stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    leading: f32,
    fragments: Vec<Fragment>,
}

impl Default for TextWalker {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            leading: 0.0,
            fragments: Vec::new(),
        }
    }
}

impl TextWalker {
    fn apply(&mut self, op: &Operation) {
        let args = &op.operands;
        let num = |i: usize| args.get(i).and_then(number).unwrap_or(0.0);
        match op.operator.as_str() {
            "q" => self.stack.push(self.ctm),
            "Q" => self.ctm = self.stack.pop().unwrap_or(Matrix::IDENTITY),
            "cm" => {
                if let Some(m) = Matrix::from_operands(args) {
                    self.ctm = m.then(self.ctm);
                }
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Td" => self.next_line(num(0), num(1)),
            "TD" => {
                self.leading = -num(1);
                self.next_line(num(0), num(1));
            }
            "TL" => self.leading = num(0),
            "T*" => self.next_line(0.0, -self.leading),
            "Tm" => {
                if let Some(m) = Matrix::from_operands(args) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = args.first() {
                    self.show(decode_pdf_string(bytes));
                }
            }
            "'" => {
                self.next_line(0.0, -self.leading);
                if let Some(Object::String(bytes, _)) = args.first() {
                    self.show(decode_pdf_string(bytes));
                }
            }
            "\"" => {
                self.next_line(0.0, -self.leading);
                if let Some(Object::String(bytes, _)) = args.get(2) {
                    self.show(decode_pdf_string(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = args.first() {
                    let mut text = String::new();
                    for item in items {
                        match item {
                            Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
                            other => {
                                let gap = number(other).is_some_and(|n| n < TJ_SPACE_THRESHOLD);
                                if gap && !text.ends_with(' ') {
                                    text.push(' ');
                                }
                            }
                        }
                    }
                    self.show(text);
                }
            }
            _ => {}
        }
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(self.tlm);
        self.tm = self.tlm;
    }

    fn show(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let (x, y) = self.tm.then(self.ctm).origin();
        self.fragments.push(Fragment { x, y, text });
    }
}

/// Sort fragments top-to-bottom into lines, then left-to-right within a line.
fn visual_order(mut fragments: Vec<Fragment>) -> Vec<String> {
    fragments.sort_by(|a, b| b.y.total_cmp(&a.y));

    let mut lines: Vec<Vec<Fragment>> = Vec::new();
    for frag in fragments {
        match lines.last_mut() {
            Some(line) if (line[0].y - frag.y).abs() < LINE_TOLERANCE => line.push(frag),
            _ => lines.push(vec![frag]),
        }
    }
    lines
        .into_iter()
        .flat_map(|mut line| {
            line.sort_by(|a, b| a.x.total_cmp(&b.x));
            line.into_iter().map(|f| f.text)
        })
        .collect()
}

/// Decode a string operand: UTF-16BE with BOM, otherwise WinAnsi.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes
        .iter()
        .filter_map(|&b| match b {
            0x80 => Some('€'),
            0x85 => Some('…'),
            0x91 => Some('‘'),
            0x92 => Some('’'),
            0x93 => Some('“'),
            0x94 => Some('”'),
            0x95 => Some('•'),
            0x96 => Some('–'),
            0x97 => Some('—'),
            0x99 => Some('™'),
            b'\t' | b'\n' | b'\r' => Some(' '),
            b if b < 0x20 || (0x7F..0xA0).contains(&b) => None,
            b => Some(b as char),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::testutil::{blank_pdf, sample_pdf};
    use crate::document::TextOptions;

    fn op(name: &str, operands: Vec<Object>) -> Operation {
        Operation::new(name, operands)
    }

    #[test]
    fn sections_per_page() {
        let text = extract_text(&sample_pdf(2)).unwrap();
        assert_eq!(text, "--- Page 1 ---\nPage 1\n\n--- Page 2 ---\nPage 2\n\n");
    }

    #[test]
    fn blank_page_has_empty_section() {
        let text = extract_text(&blank_pdf(1)).unwrap();
        assert_eq!(text, "--- Page 1 ---\n\n\n");
    }

    #[test]
    fn visual_order_is_top_down_then_left_right() {
        let mut doc = PdfDocument::load(&blank_pdf(1)).unwrap();
        doc.draw_text(0, "bottom", &TextOptions::at(10.0, 10.0)).unwrap();
        doc.draw_text(0, "right", &TextOptions::at(200.0, 300.0)).unwrap();
        doc.draw_text(0, "left", &TextOptions::at(20.0, 301.0)).unwrap();
        let doc = PdfDocument::load(&doc.save().unwrap()).unwrap();
        assert_eq!(page_text(&doc, 0).unwrap(), "left right bottom");
    }

    #[test]
    fn walker_tracks_td_and_leading() {
        let mut w = TextWalker::default();
        for o in [
            op("BT", vec![]),
            op("Td", vec![100.into(), 700.into()]),
            op("Tj", vec![Object::string_literal("first")]),
            op("TL", vec![14.into()]),
            op("T*", vec![]),
            op("Tj", vec![Object::string_literal("second")]),
            op("ET", vec![]),
        ] {
            w.apply(&o);
        }
        assert_eq!(w.fragments.len(), 2);
        assert_eq!((w.fragments[1].x, w.fragments[1].y), (100.0, 686.0));
    }

    #[test]
    fn tj_array_inserts_space_on_wide_kerning() {
        let mut w = TextWalker::default();
        w.apply(&op(
            "TJ",
            vec![Object::Array(vec![
                Object::string_literal("Hello"),
                Object::Integer(-400),
                Object::string_literal("world"),
                Object::Integer(-20),
                Object::string_literal("!"),
            ])],
        ));
        assert_eq!(w.fragments[0].text, "Hello world!");
    }

    #[test]
    fn cm_moves_text_origin() {
        let mut w = TextWalker::default();
        for o in [
            op("q", vec![]),
            op("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 50.into(), 60.into()]),
            op("BT", vec![]),
            op("Tj", vec![Object::string_literal("x")]),
            op("ET", vec![]),
            op("Q", vec![]),
        ] {
            w.apply(&o);
        }
        assert_eq!((w.fragments[0].x, w.fragments[0].y), (50.0, 60.0));
    }

    #[test]
    fn text_only_page_has_no_image() {
        assert!(!page_has_image(&sample_pdf(1), 0).unwrap());
    }
}
