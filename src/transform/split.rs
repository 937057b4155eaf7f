//! Split: extract a page range into one document, or every page into its own.

use super::{artifact, TransformOutput};
use crate::document::PdfDocument;
use crate::error::{BoardError, NodeError};
use crate::graph::{SplitConfig, SplitMode};
use crate::page_range::PageRange;
use crate::store::FileArtifact;
use tracing::info;

pub(crate) fn split(cfg: &SplitConfig, file: &FileArtifact) -> Result<TransformOutput, NodeError> {
    let src = PdfDocument::load(&file.data)?;
    let total = src.page_count();
    match cfg.mode {
        SplitMode::Range => {
            let range = if cfg.range.is_blank() { PageRange::new("1") } else { cfg.range.clone() };
            let indices = range.to_indices(total);
            let bytes = extract(&src, &indices)?;
            info!("Extracted {} of {} pages ({})", indices.len(), total, range);
            Ok(TransformOutput::single(artifact("split", "extracted.pdf", bytes)))
        }
        SplitMode::ExtractAll => {
            let files = (0..total)
                .map(|i| Ok(artifact("split", format!("page-{}.pdf", i + 1), extract(&src, &[i])?)))
                .collect::<Result<Vec<_>, BoardError>>()?;
            info!("Split {} pages into separate documents", total);
            Ok(TransformOutput::list(files))
        }
    }
}

/// A new document holding `indices` of `src`, in the given order.
pub(crate) fn extract(src: &PdfDocument, indices: &[usize]) -> Result<Vec<u8>, BoardError> {
    let mut out = PdfDocument::new();
    for page in out.copy_pages(src, indices)? {
        out.add_page(page)?;
    }
    out.save()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::extract_text;
    use crate::document::testutil::sample_pdf;
    use crate::transform::merge::merge_pdfs;
    use crate::transform::testutil::file;

    fn cfg(mode: SplitMode, range: &str) -> SplitConfig {
        SplitConfig {
            mode,
            range: PageRange::new(range),
        }
    }

    #[test]
    fn range_keeps_selected_pages_ascending() {
        let f = file("doc.pdf", sample_pdf(5));
        let out = split(&cfg(SplitMode::Range, "4,2,9"), &f).unwrap();
        assert!(!out.many);
        assert_eq!(out.files[0].name, "extracted.pdf");
        let text = extract_text(&out.files[0].data).unwrap();
        assert_eq!(text, "--- Page 1 ---\nPage 2\n\n--- Page 2 ---\nPage 4\n\n");
    }

    #[test]
    fn empty_selection_gives_empty_document() {
        let f = file("doc.pdf", sample_pdf(2));
        let out = split(&cfg(SplitMode::Range, "7-9"), &f).unwrap();
        assert_eq!(PdfDocument::load(&out.files[0].data).unwrap().page_count(), 0);
    }

    #[test]
    fn extract_all_yields_one_file_per_page() {
        let f = file("doc.pdf", sample_pdf(3));
        let out = split(&cfg(SplitMode::ExtractAll, ""), &f).unwrap();
        assert!(out.many);
        let names: Vec<_> = out.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["page-1.pdf", "page-2.pdf", "page-3.pdf"]);
    }

    #[test]
    fn split_then_merge_round_trips_pagination() {
        let original = sample_pdf(4);
        let doc = file("d.pdf", original.clone());
        let parts = split(&cfg(SplitMode::ExtractAll, ""), &doc).unwrap();
        let docs: Vec<&[u8]> = parts.files.iter().map(|f| &f.data[..]).collect();
        let merged = merge_pdfs(&docs).unwrap();
        assert_eq!(extract_text(&merged).unwrap(), extract_text(&original).unwrap());
    }
}
