//! Output nodes: package upstream files for delivery.
//!
//! ```text
//!  upstream files ──► file_type ──┬─ auto / pdf ─► as-is, renamed
//!                                 ├─ text ──────► PDFs → plain text
//!                                 └─ image ─────► PDFs rendered, images kept
//!                                                  └─ individual | single_image | zip
//! ```
//!
//! Naming: one file keeps `output_file_name` (or its own name); several get
//! `<base>-<i>.<ext>` with `base = output_file_name or "output"`.

use super::{NodeInput, TransformContext, TransformOutput};
use crate::codec::{data_uri, encode_png, extract_text, render_all_pages_to_raster, stitch_vertical};
use crate::error::{BoardError, NodeError};
use crate::graph::{ExportType, ImageExportMode, Node, OutputConfig};
use crate::store::{
    extension, mime_for, stem, FileArtifact, FileClass, FileId, FileStore, ImageFormat,
};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Scale at which PDFs are rendered for image exports.
const EXPORT_SCALE: f32 = 2.0;

pub(crate) fn package(
    cfg: &OutputConfig,
    inputs: &[NodeInput],
    ctx: &TransformContext<'_>,
) -> Result<TransformOutput, NodeError> {
    let files: Vec<&FileArtifact> = inputs.iter().flat_map(|i| i.files.iter()).collect();
    if files.is_empty() {
        return Err(NodeError::MissingInput(
            inputs.first().map_or_else(|| "no input connected".to_string(), |i| i.source.clone()),
        ));
    }
    let base = cfg
        .output_file_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let out = match cfg.file_type {
        ExportType::Auto | ExportType::Pdf => renamed(&files, base),
        ExportType::Text => {
            let texts = files
                .iter()
                .map(|f| as_text(f))
                .collect::<Result<Vec<_>, BoardError>>()?;
            renamed(&texts.iter().collect::<Vec<_>>(), base)
        }
        ExportType::Image => images(cfg.image_export_mode, &files, base.unwrap_or("output"), ctx)?,
    };
    info!("Packaged {} upstream file(s) into {} deliverable(s)", files.len(), out.len());
    let many = out.len() > 1;
    Ok(TransformOutput {
        files: out,
        many,
        preview: None,
    })
}

fn renamed(files: &[&FileArtifact], base: Option<&str>) -> Vec<FileArtifact> {
    if let [only] = files {
        let name = base.map_or_else(|| only.name.clone(), str::to_string);
        return vec![export_artifact(name, only.data.clone())];
    }
    files
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let ext = extension(&f.name).map(|e| format!(".{}", e)).unwrap_or_default();
            let name = format!("{}-{}{}", base.unwrap_or("output"), i + 1, ext);
            export_artifact(name, f.data.clone())
        })
        .collect()
}

fn as_text(file: &FileArtifact) -> Result<FileArtifact, BoardError> {
    match file.class() {
        FileClass::Pdf => {
            let text = extract_text(&file.data)?;
            Ok(export_artifact(format!("{}.txt", stem(&file.name)), text.into_bytes().into()))
        }
        _ => Ok(file.clone()),
    }
}

fn images(
    mode: ImageExportMode,
    files: &[&FileArtifact],
    base: &str,
    ctx: &TransformContext<'_>,
) -> Result<Vec<FileArtifact>, NodeError> {
    let mut rasters: Vec<(Vec<u8>, &'static str)> = Vec::new();
    for file in files {
        match file.class() {
            FileClass::Pdf => {
                let pages = render_all_pages_to_raster(ctx.renderer, &file.data, EXPORT_SCALE)?;
                debug!("Rendered {} pages of '{}' for export", pages.len(), file.name);
                rasters.extend(pages.into_iter().map(|png| (png, "png")));
            }
            _ => match ImageFormat::detect(&file.name, &file.data) {
                Some(ImageFormat::Png) => rasters.push((file.data.to_vec(), "png")),
                Some(ImageFormat::Jpg) => rasters.push((file.data.to_vec(), "jpg")),
                None => warn!("Skipping '{}': not a PDF or image", file.name),
            },
        }
    }
    if rasters.is_empty() {
        return Err(NodeError::InvalidConfig("nothing to export as image".into()));
    }

    match mode {
        ImageExportMode::Individual => Ok(rasters
            .into_iter()
            .enumerate()
            .map(|(i, (bytes, ext))| {
                export_artifact(format!("{}-{}.{}", base, i + 1, ext), bytes.into())
            })
            .collect()),
        ImageExportMode::SingleImage => {
            let decoded = rasters
                .iter()
                .map(|(bytes, _)| image::load_from_memory(bytes).map_err(BoardError::image))
                .collect::<Result<Vec<_>, BoardError>>()?;
            let stitched = encode_png(&stitch_vertical(&decoded)?)?;
            Ok(vec![export_artifact(format!("{}.png", base), stitched.into())])
        }
        ImageExportMode::Zip => {
            let archive = zip_archive(base, &rasters)
                .map_err(|e| NodeError::Internal(format!("zip failed: {}", e)))?;
            Ok(vec![export_artifact(format!("{}.zip", base), archive.into())])
        }
    }
}

fn zip_archive(base: &str, rasters: &[(Vec<u8>, &'static str)]) -> zip::result::ZipResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (i, (bytes, ext)) in rasters.iter().enumerate() {
        writer.start_file(format!("{}-{}.{}", base, i + 1, ext), options)?;
        writer.write_all(bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}

fn export_artifact(name: String, data: Arc<[u8]>) -> FileArtifact {
    FileArtifact::new(FileId::generate("export"), name, data)
}

// ── Delivery ─────────────────────────────────────────────────────────────

/// A named byte buffer handed to the user.
#[derive(Clone)]
pub struct Delivery {
    pub name: String,
    pub mime: &'static str,
    pub bytes: Arc<[u8]>,
}

impl From<&FileArtifact> for Delivery {
    fn from(file: &FileArtifact) -> Self {
        Self {
            name: file.name.clone(),
            mime: mime_for(&file.name),
            bytes: file.data.clone(),
        }
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Delivery {
    /// The bytes as a `data:` URI, for hosts that display previews inline.
    pub fn data_uri(&self) -> String {
        data_uri(&self.bytes, self.mime)
    }

    /// Write into `dir` under the delivery name; returns the full path.
    ///
    /// Only the final component of the name is used, so a name carrying
    /// directories (`../x`, `/etc/x`) still lands inside `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, BoardError> {
        let name = Path::new(&self.name).file_name().ok_or_else(|| {
            BoardError::InvalidConfig(format!("Unusable output file name '{}'", self.name))
        })?;
        let path = dir.join(name);
        std::fs::write(&path, &self.bytes).map_err(|source| BoardError::OutputWriteFailed {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// The deliverables currently exposed by `node`, in output order.
///
/// Ids whose artifact is no longer in the store are skipped.
pub fn deliveries(store: &FileStore, node: &Node) -> Vec<Delivery> {
    node.output_file_ids()
        .iter()
        .filter_map(|id| store.get(id))
        .map(|f| Delivery::from(&f))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::draw::tests::{jpeg_bytes, png_bytes};
    use crate::document::testutil::sample_pdf;
    use crate::transform::testutil::{ctx, file, input};
    use std::io::Read;

    fn cfg(file_type: ExportType, mode: ImageExportMode, name: Option<&str>) -> OutputConfig {
        OutputConfig {
            file_type,
            output_file_name: name.map(str::to_string),
            image_export_mode: mode,
        }
    }

    fn names(out: &TransformOutput) -> Vec<&str> {
        out.files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn single_file_keeps_name_or_uses_override() {
        let f = file("merged.pdf", sample_pdf(1));
        let inputs = [input("m", vec![f])];
        let c = cfg(ExportType::Auto, ImageExportMode::Individual, None);
        let out = package(&c, &inputs, &ctx()).unwrap();
        assert_eq!(names(&out), ["merged.pdf"]);
        let c = cfg(ExportType::Pdf, ImageExportMode::Individual, Some("final.pdf"));
        let out = package(&c, &inputs, &ctx()).unwrap();
        assert_eq!(names(&out), ["final.pdf"]);
    }

    #[test]
    fn several_files_are_numbered() {
        let parts = vec![file("page-1.pdf", sample_pdf(1)), file("page-2.pdf", sample_pdf(1))];
        let c = cfg(ExportType::Auto, ImageExportMode::Individual, Some("part"));
        let out = package(&c, &[input("s", parts)], &ctx()).unwrap();
        assert!(out.many);
        assert_eq!(names(&out), ["part-1.pdf", "part-2.pdf"]);
    }

    #[test]
    fn image_individual_renders_every_page() {
        let f = file("doc.pdf", sample_pdf(3));
        let c = cfg(ExportType::Image, ImageExportMode::Individual, None);
        let out = package(&c, &[input("d", vec![f])], &ctx()).unwrap();
        assert_eq!(names(&out), ["output-1.png", "output-2.png", "output-3.png"]);
        assert!(out.files.iter().all(|f| f.data.starts_with(b"\x89PNG")));
    }

    #[test]
    fn single_image_stitches_vertically() {
        let imgs = vec![file("a.png", png_bytes(10, 4, 255)), file("b.png", png_bytes(6, 5, 255))];
        let c = cfg(ExportType::Image, ImageExportMode::SingleImage, Some("sheet"));
        let out = package(&c, &[input("i", imgs)], &ctx()).unwrap();
        assert_eq!(names(&out), ["sheet.png"]);
        let img = image::load_from_memory(&out.files[0].data).unwrap();
        assert_eq!((img.width(), img.height()), (10, 9));
    }

    #[test]
    fn zip_holds_numbered_entries() {
        let imgs = vec![file("a.png", png_bytes(2, 2, 255)), file("b.jpg", jpeg_bytes(2, 2))];
        let c = cfg(ExportType::Image, ImageExportMode::Zip, None);
        let out = package(&c, &[input("i", imgs)], &ctx()).unwrap();
        assert_eq!(names(&out), ["output.zip"]);

        let mut archive = zip::ZipArchive::new(Cursor::new(out.files[0].data.to_vec())).unwrap();
        assert_eq!(archive.len(), 2);
        let mut first = Vec::new();
        archive.by_name("output-1.png").unwrap().read_to_end(&mut first).unwrap();
        assert!(first.starts_with(b"\x89PNG"));
        assert!(archive.by_name("output-2.jpg").is_ok());
    }

    #[test]
    fn text_export_extracts_pdfs() {
        let f = file("report.pdf", sample_pdf(1));
        let c = cfg(ExportType::Text, ImageExportMode::Individual, None);
        let out = package(&c, &[input("r", vec![f])], &ctx()).unwrap();
        assert_eq!(names(&out), ["report.txt"]);
        assert_eq!(&out.files[0].data[..], b"--- Page 1 ---\nPage 1\n\n");
    }

    #[test]
    fn delivery_mime_follows_extension() {
        let d = Delivery::from(&file("x.zip", vec![1, 2]));
        assert_eq!(d.mime, "application/zip");
        assert_eq!(Delivery::from(&file("x.bin", vec![])).mime, "application/octet-stream");
        assert_eq!(d.data_uri(), "data:application/zip;base64,AQI=");
    }

    #[test]
    fn delivery_writes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let d = Delivery::from(&file("out.pdf", sample_pdf(1)));
        let path = d.write_to(dir.path()).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), &d.bytes[..]);
    }

    #[test]
    fn delivery_cannot_escape_its_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("out");
        std::fs::create_dir(&dir).unwrap();

        let path = Delivery::from(&file("../../escaped.pdf", vec![1])).write_to(&dir).unwrap();
        assert_eq!(path, dir.join("escaped.pdf"));
        let path = Delivery::from(&file("/tmp/abs.pdf", vec![2])).write_to(&dir).unwrap();
        assert_eq!(path, dir.join("abs.pdf"));
        assert!(!root.path().join("escaped.pdf").exists());

        for bad in ["", "..", "a/.."] {
            let err = Delivery::from(&file(bad, vec![3])).write_to(&dir).unwrap_err();
            assert!(matches!(err, BoardError::InvalidConfig(_)), "[{bad}] {err:?}");
        }
    }
}
