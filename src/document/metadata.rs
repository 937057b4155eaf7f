//! Document information dictionary (`/Info`).

use super::PdfDocument;
use crate::error::BoardError;
use lopdf::{Dictionary, Object, StringFormat};
use serde::{Deserialize, Serialize};

/// The six descriptive fields of a PDF.
///
/// `None` means "absent" when read and "leave untouched" when written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

impl Metadata {
    /// Split a comma-separated keyword string, trimming each entry.
    pub fn parse_keywords(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn text_fields(&self) -> [(&'static str, Option<&String>); 5] {
        [
            ("Title", self.title.as_ref()),
            ("Author", self.author.as_ref()),
            ("Subject", self.subject.as_ref()),
            ("Creator", self.creator.as_ref()),
            ("Producer", self.producer.as_ref()),
        ]
    }
}

impl PdfDocument {
    pub fn metadata(&self) -> Metadata {
        let Some(info) = self.info_dict() else {
            return Metadata::default();
        };
        let read = |key: &[u8]| -> Option<String> {
            match info.get(key).ok().map(|o| self.resolve(o)) {
                Some(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
                _ => None,
            }
        };
        Metadata {
            title: read(b"Title"),
            author: read(b"Author"),
            subject: read(b"Subject"),
            keywords: read(b"Keywords").map(|k| Metadata::parse_keywords(&k)),
            creator: read(b"Creator"),
            producer: read(b"Producer"),
        }
    }

    /// Write every field that is `Some`; leave the others as they are.
    pub fn set_metadata(&mut self, fields: &Metadata) -> Result<(), BoardError> {
        let info = self.info_dict_mut()?;
        for (key, value) in fields.text_fields() {
            if let Some(value) = value {
                info.set(key, encode_text_string(value));
            }
        }
        if let Some(keywords) = &fields.keywords {
            info.set("Keywords", encode_text_string(&keywords.join(", ")));
        }
        Ok(())
    }

    fn info_dict(&self) -> Option<&Dictionary> {
        let info = self.doc.trailer.get(b"Info").ok()?;
        self.resolve(info).as_dict().ok()
    }

    fn info_dict_mut(&mut self) -> Result<&mut Dictionary, BoardError> {
        let existing = self
            .doc
            .trailer
            .get(b"Info")
            .and_then(Object::as_reference)
            .ok()
            .filter(|id| self.doc.get_dictionary(*id).is_ok());
        let id = match existing {
            Some(id) => id,
            None => {
                // A direct /Info dictionary is legal but rare; lift it into
                // an indirect object so there is one place to edit.
                let direct = self.info_dict().cloned().unwrap_or_default();
                let id = self.doc.add_object(direct);
                self.doc.trailer.set("Info", Object::Reference(id));
                id
            }
        };
        self.doc.get_dictionary_mut(id).map_err(BoardError::pdf)
    }
}

/// Encode as PDFDocEncoding when Latin-1 suffices, else UTF-16BE with BOM.
fn encode_text_string(s: &str) -> Object {
    if s.chars().all(|c| (c as u32) <= 0xFF) {
        Object::String(s.chars().map(|c| c as u32 as u8).collect(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in s.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[test]
    fn writes_only_provided_fields() {
        let mut doc = PdfDocument::load(&sample_pdf(1)).unwrap();
        doc.set_metadata(&Metadata {
            title: Some("Quarterly".into()),
            author: Some("Ops".into()),
            ..Default::default()
        })
        .unwrap();
        let mut doc = PdfDocument::load(&doc.save().unwrap()).unwrap();
        doc.set_metadata(&Metadata {
            subject: Some("Numbers".into()),
            ..Default::default()
        })
        .unwrap();

        let meta = PdfDocument::load(&doc.save().unwrap()).unwrap().metadata();
        assert_eq!(meta.title.as_deref(), Some("Quarterly"));
        assert_eq!(meta.author.as_deref(), Some("Ops"));
        assert_eq!(meta.subject.as_deref(), Some("Numbers"));
        assert_eq!(meta.creator, None);
    }

    #[test]
    fn keywords_are_split_and_trimmed() {
        assert_eq!(Metadata::parse_keywords(" a, b ,,c "), vec!["a", "b", "c"]);
    }

    #[test]
    fn keywords_survive_a_save() {
        let mut doc = PdfDocument::load(&sample_pdf(1)).unwrap();
        doc.set_metadata(&Metadata {
            keywords: Some(vec!["pdf".into(), "graph".into()]),
            ..Default::default()
        })
        .unwrap();
        let meta = PdfDocument::load(&doc.save().unwrap()).unwrap().metadata();
        assert_eq!(meta.keywords, Some(vec!["pdf".to_string(), "graph".to_string()]));
    }

    #[test]
    fn non_latin_titles_use_utf16() {
        let obj = encode_text_string("Отчёт");
        let Object::String(bytes, _) = obj else { panic!() };
        assert_eq!(&bytes[..2], &[0xFE, 0xFF]);
        assert_eq!(decode_text_string(&bytes), "Отчёт");
    }
}
