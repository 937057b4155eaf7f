//! Merge: concatenate the pages of every input, in handle order.

use super::{artifact, NodeInput, TransformOutput};
use crate::document::PdfDocument;
use crate::error::{BoardError, NodeError};
use crate::graph::ports::merge_index;
use tracing::info;

pub(crate) fn merge(inputs: &[NodeInput]) -> Result<TransformOutput, NodeError> {
    let mut ordered: Vec<&NodeInput> = inputs.iter().collect();
    ordered.sort_by_key(|i| i.handle.as_deref().and_then(merge_index).unwrap_or(usize::MAX));

    // A list-valued producer contributes all of its files before the next handle.
    let docs: Vec<&[u8]> = ordered
        .iter()
        .flat_map(|i| i.files.iter().map(|f| &f.data[..]))
        .collect();
    if docs.len() < 2 {
        return Err(NodeError::InsufficientInputs {
            needed: 2,
            got: docs.len(),
        });
    }
    let merged = merge_pdfs(&docs)?;
    info!("Merged {} documents", docs.len());
    Ok(TransformOutput::single(artifact("merged", "merged.pdf", merged)))
}

/// A new document holding every page of `docs`, in order.
pub(crate) fn merge_pdfs(docs: &[&[u8]]) -> Result<Vec<u8>, BoardError> {
    let mut out = PdfDocument::new();
    for bytes in docs {
        let src = PdfDocument::load(bytes)?;
        let all: Vec<usize> = (0..src.page_count()).collect();
        for page in out.copy_pages(&src, &all)? {
            out.add_page(page)?;
        }
    }
    out.save()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::extract_text;
    use crate::document::testutil::sample_pdf;
    use crate::transform::testutil::*;

    #[test]
    fn merges_in_handle_order() {
        let a = file("a.pdf", sample_pdf(1));
        let b = file("b.pdf", sample_pdf(2));
        let out = merge(&[
            on_handle("input-1", "b", vec![b]),
            on_handle("input-0", "a", vec![a]),
        ])
        .unwrap();
        assert_eq!(out.files[0].name, "merged.pdf");
        let doc = PdfDocument::load(&out.files[0].data).unwrap();
        assert_eq!(doc.page_count(), 3);
        let text = extract_text(&out.files[0].data).unwrap();
        assert!(text.starts_with("--- Page 1 ---\nPage 1\n"), "got: {text}");
        assert!(text.contains("--- Page 3 ---\nPage 2\n"), "got: {text}");
    }

    #[test]
    fn list_inputs_are_flattened() {
        let parts = vec![file("p1.pdf", sample_pdf(1)), file("p2.pdf", sample_pdf(1))];
        let out = merge(&[on_handle("input-0", "split", parts)]).unwrap();
        assert_eq!(PdfDocument::load(&out.files[0].data).unwrap().page_count(), 2);
    }

    #[test]
    fn one_file_is_not_enough() {
        let a = file("a.pdf", sample_pdf(1));
        assert_eq!(
            merge(&[on_handle("input-0", "a", vec![a])]).unwrap_err(),
            NodeError::InsufficientInputs { needed: 2, got: 1 }
        );
    }

    #[test]
    fn garbage_input_is_format_error() {
        let a = file("a.pdf", sample_pdf(1));
        let b = file("b.pdf", b"nope".to_vec());
        assert!(matches!(
            merge(&[on_handle("input-0", "a", vec![a]), on_handle("input-1", "b", vec![b])]),
            Err(NodeError::Format(_))
        ));
    }
}
