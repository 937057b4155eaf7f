//! Page-tree surgery: remove, copy across documents, append.
//!
//! Copying follows the same two-step contract as most PDF toolkits: import
//! first ([`PdfDocument::copy_pages`] returns detached [`PageRef`]s), then
//! attach ([`PdfDocument::add_page`]). Importing materialises inherited
//! attributes onto the page and pulls in every object the page reaches,
//! except its `/Parent` chain and other pages outside the batch.

use super::{PdfDocument, INHERITABLE};
use crate::error::BoardError;
use lopdf::{Dictionary, Object, ObjectId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A page object living in a document but not (yet) in its page tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRef(pub(crate) ObjectId);

impl PdfDocument {
    /// Remove the page at `index` from the page tree.
    ///
    /// Callers removing several pages must go from the highest index down.
    pub fn remove_page(&mut self, index: usize) -> Result<(), BoardError> {
        let page_id = self.page_id(index)?;
        let parent = self
            .doc
            .get_dictionary(page_id)
            .and_then(|d| d.get(b"Parent"))
            .and_then(Object::as_reference)
            .map_err(BoardError::pdf)?;

        let kids = self
            .doc
            .get_dictionary_mut(parent)
            .and_then(|d| d.get_mut(b"Kids"))
            .and_then(Object::as_array_mut)
            .map_err(BoardError::pdf)?;
        kids.retain(|k| k.as_reference().ok() != Some(page_id));

        // Every ancestor's /Count includes this page.
        let mut node = Some(parent);
        while let Some(id) = node {
            let dict = self.doc.get_dictionary_mut(id).map_err(BoardError::pdf)?;
            let count = dict.get(b"Count").and_then(Object::as_i64).unwrap_or(1);
            dict.set("Count", Object::Integer((count - 1).max(0)));
            node = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        self.doc.objects.remove(&page_id);
        debug!("Removed page {} (object {:?})", index + 1, page_id);
        Ok(())
    }

    /// Import pages `indices` of `from` into this document.
    ///
    /// Objects shared between the copied pages (fonts, images) are imported
    /// once. The returned refs are detached; pass them to [`Self::add_page`].
    pub fn copy_pages(
        &mut self,
        from: &PdfDocument,
        indices: &[usize],
    ) -> Result<Vec<PageRef>, BoardError> {
        let source_ids: Vec<ObjectId> = indices
            .iter()
            .map(|&i| from.page_id(i))
            .collect::<Result<_, _>>()?;
        let all_pages: HashSet<ObjectId> = from.page_ids().into_iter().collect();

        let mut importer = Importer {
            from,
            all_pages: &all_pages,
            map: HashMap::new(),
        };
        // Reserve targets up front so cross-references between copied
        // pages (link annotations, /P back-pointers) resolve to the copies.
        let targets: Vec<ObjectId> = source_ids
            .iter()
            .map(|&src| {
                let new_id = self.doc.new_object_id();
                importer.map.insert(src, new_id);
                new_id
            })
            .collect();

        for (&src, &dst) in source_ids.iter().zip(&targets) {
            let mut page = from.doc.get_dictionary(src).map_err(BoardError::pdf)?.clone();
            for key in INHERITABLE {
                if !page.has(key) {
                    if let Some(value) = from.inherited(src, key) {
                        page.set(key.to_vec(), value);
                    }
                }
            }
            page.remove(b"Parent");
            let imported = importer.import_dict(self, &page)?;
            self.doc.objects.insert(dst, Object::Dictionary(imported));
        }

        debug!("Copied {} pages ({} objects imported)", targets.len(), importer.map.len());
        Ok(targets.into_iter().map(PageRef).collect())
    }

    /// Append a detached page to the end of the page tree.
    pub fn add_page(&mut self, page: PageRef) -> Result<(), BoardError> {
        let root = self.pages_root()?;
        self.page_dict_mut(page.0)?
            .set("Parent", Object::Reference(root));
        let pages = self.doc.get_dictionary_mut(root).map_err(BoardError::pdf)?;
        match pages.get_mut(b"Kids").and_then(Object::as_array_mut) {
            Ok(kids) => kids.push(Object::Reference(page.0)),
            Err(_) => pages.set("Kids", Object::Array(vec![Object::Reference(page.0)])),
        }
        let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        pages.set("Count", Object::Integer(count + 1));
        Ok(())
    }
}

/// Deep-copies objects from one document into another, once per batch.
struct Importer<'a> {
    from: &'a PdfDocument,
    all_pages: &'a HashSet<ObjectId>,
    map: HashMap<ObjectId, ObjectId>,
}

impl Importer<'_> {
    fn import_ref(&mut self, into: &mut PdfDocument, src: ObjectId) -> Result<Object, BoardError> {
        if let Some(&dst) = self.map.get(&src) {
            return Ok(Object::Reference(dst));
        }
        // Pages outside the batch stay behind.
        if self.all_pages.contains(&src) {
            return Ok(Object::Null);
        }
        let Ok(source) = self.from.doc.get_object(src) else {
            return Ok(Object::Null);
        };
        if is_page_tree_node(source) {
            return Ok(Object::Null);
        }
        let dst = into.doc.new_object_id();
        self.map.insert(src, dst);
        let copied = self.import_obj(into, source)?;
        into.doc.objects.insert(dst, copied);
        Ok(Object::Reference(dst))
    }

    fn import_obj(&mut self, into: &mut PdfDocument, obj: &Object) -> Result<Object, BoardError> {
        Ok(match obj {
            Object::Reference(id) => self.import_ref(into, *id)?,
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|o| self.import_obj(into, o))
                    .collect::<Result<_, _>>()?,
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.import_dict(into, dict)?),
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.import_dict(into, &stream.dict)?;
                Object::Stream(copy)
            }
            other => other.clone(),
        })
    }

    fn import_dict(
        &mut self,
        into: &mut PdfDocument,
        dict: &Dictionary,
    ) -> Result<Dictionary, BoardError> {
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            let imported = self.import_obj(into, value)?;
            if key.as_slice() == b"Parent" && matches!(imported, Object::Null) {
                continue;
            }
            out.set(key.clone(), imported);
        }
        Ok(out)
    }
}

fn is_page_tree_node(obj: &Object) -> bool {
    let Ok(dict) = obj.as_dict() else {
        return false;
    };
    matches!(dict.get(b"Type").and_then(Object::as_name), Ok(b"Pages") | Ok(b"Page"))
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[test]
    fn remove_updates_count() {
        let mut doc = PdfDocument::load(&sample_pdf(3)).unwrap();
        doc.remove_page(1).unwrap();
        let bytes = doc.save().unwrap();
        assert_eq!(PdfDocument::load(&bytes).unwrap().page_count(), 2);
    }

    #[test]
    fn remove_out_of_range_fails() {
        let mut doc = PdfDocument::load(&sample_pdf(1)).unwrap();
        assert!(matches!(doc.remove_page(3), Err(BoardError::PageOutOfRange { .. })));
    }

    #[test]
    fn copy_materialises_inherited_attributes() {
        let src = PdfDocument::load(&inherited_attrs_pdf()).unwrap();
        let mut dst = PdfDocument::new();
        for page in dst.copy_pages(&src, &[0]).unwrap() {
            dst.add_page(page).unwrap();
        }
        let out = PdfDocument::load(&dst.save().unwrap()).unwrap();
        assert_eq!(out.page_size(0).unwrap(), (200.0, 100.0));
        assert_eq!(out.page_rotation(0).unwrap(), 90);
    }

    #[test]
    fn copy_selected_pages_in_given_order() {
        let src = PdfDocument::load(&sample_pdf(4)).unwrap();
        let mut dst = PdfDocument::new();
        let refs = dst.copy_pages(&src, &[3, 0]).unwrap();
        assert_eq!(refs.len(), 2);
        for page in refs {
            dst.add_page(page).unwrap();
        }
        let bytes = dst.save().unwrap();
        let out = PdfDocument::load(&bytes).unwrap();
        let texts: Vec<String> = (0..out.page_count())
            .map(|i| crate::codec::page_text(&out, i).unwrap())
            .collect();
        assert_eq!(texts, ["Page 4", "Page 1"]);
    }

    #[test]
    fn copy_does_not_drag_in_other_pages() {
        let src = PdfDocument::load(&sample_pdf(5)).unwrap();
        let mut dst = PdfDocument::new();
        for page in dst.copy_pages(&src, &[2]).unwrap() {
            dst.add_page(page).unwrap();
        }
        let bytes = dst.save().unwrap();
        assert_eq!(PdfDocument::load(&bytes).unwrap().page_count(), 1);
        assert!(bytes.len() < sample_pdf(5).len());
    }
}
