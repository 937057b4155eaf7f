//! Nodes, edges and the closed catalogue of node kinds.
//!
//! A node's behaviour is fully described by its [`NodeOp`]: the kind plus a
//! typed config struct for that kind. On the wire an op is
//! `{"kind": "<wireName>", "config": {...}}`, so a graph saved by one build
//! reloads in another as long as the kind names are stable.

use crate::document::{Metadata, Permissions};
use crate::error::NodeError;
use crate::page_range::PageRange;
use crate::store::{FileClass, FileId};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Geometry ─────────────────────────────────────────────────────────────

/// Canvas position of a node's top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Measured size of a node on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

// ── Kinds ────────────────────────────────────────────────────────────────

/// Every node kind the engine knows. The set is closed: adding one means
/// adding a variant here, a port signature and a transform, and the compiler
/// points at every `match` that needs updating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Input,
    Output,
    Preview,
    Merge,
    Split,
    Rotate,
    RemovePages,
    PageNumbers,
    Watermark,
    Secure,
    ImageToPdf,
    PdfToImage,
    PdfToText,
    Metadata,
    AddImage,
    Flatten,
    RemoveBlankPages,
}

impl NodeKind {
    pub const ALL: [NodeKind; 17] = [
        NodeKind::Input,
        NodeKind::Output,
        NodeKind::Preview,
        NodeKind::Merge,
        NodeKind::Split,
        NodeKind::Rotate,
        NodeKind::RemovePages,
        NodeKind::PageNumbers,
        NodeKind::Watermark,
        NodeKind::Secure,
        NodeKind::ImageToPdf,
        NodeKind::PdfToImage,
        NodeKind::PdfToText,
        NodeKind::Metadata,
        NodeKind::AddImage,
        NodeKind::Flatten,
        NodeKind::RemoveBlankPages,
    ];

    /// Name used in serialised graphs.
    pub fn wire_name(self) -> &'static str {
        match self {
            NodeKind::Input => "input",
            NodeKind::Output => "output",
            NodeKind::Preview => "preview",
            NodeKind::Merge => "merge",
            NodeKind::Split => "split",
            NodeKind::Rotate => "rotate",
            NodeKind::RemovePages => "removePages",
            NodeKind::PageNumbers => "pageNumbers",
            NodeKind::Watermark => "watermark",
            NodeKind::Secure => "secure",
            NodeKind::ImageToPdf => "imageToPdf",
            NodeKind::PdfToImage => "pdfToImage",
            NodeKind::PdfToText => "pdfToText",
            NodeKind::Metadata => "metadata",
            NodeKind::AddImage => "addImage",
            NodeKind::Flatten => "flatten",
            NodeKind::RemoveBlankPages => "removeBlankPages",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.wire_name() == name)
    }

    /// Kinds with one input and one output that can be dropped onto an
    /// existing edge and spliced into it.
    pub fn is_in_place(self) -> bool {
        matches!(
            self,
            NodeKind::Rotate
                | NodeKind::RemovePages
                | NodeKind::PageNumbers
                | NodeKind::Watermark
                | NodeKind::Split
                | NodeKind::PdfToImage
                | NodeKind::ImageToPdf
                | NodeKind::RemoveBlankPages
                | NodeKind::Flatten
                | NodeKind::Secure
        )
    }

    /// The op of this kind with default configuration.
    pub fn default_op(self) -> NodeOp {
        match self {
            NodeKind::Input => NodeOp::Input(Default::default()),
            NodeKind::Output => NodeOp::Output(Default::default()),
            NodeKind::Preview => NodeOp::Preview(Default::default()),
            NodeKind::Merge => NodeOp::Merge(Default::default()),
            NodeKind::Split => NodeOp::Split(Default::default()),
            NodeKind::Rotate => NodeOp::Rotate(Default::default()),
            NodeKind::RemovePages => NodeOp::RemovePages(Default::default()),
            NodeKind::PageNumbers => NodeOp::PageNumbers(Default::default()),
            NodeKind::Watermark => NodeOp::Watermark(Default::default()),
            NodeKind::Secure => NodeOp::Secure(Default::default()),
            NodeKind::ImageToPdf => NodeOp::ImageToPdf(Default::default()),
            NodeKind::PdfToImage => NodeOp::PdfToImage(Default::default()),
            NodeKind::PdfToText => NodeOp::PdfToText(Default::default()),
            NodeKind::Metadata => NodeOp::Metadata(Default::default()),
            NodeKind::AddImage => NodeOp::AddImage(Default::default()),
            NodeKind::Flatten => NodeOp::Flatten(Default::default()),
            NodeKind::RemoveBlankPages => NodeOp::RemoveBlankPages(Default::default()),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ── Per-kind configuration ───────────────────────────────────────────────

/// A node's kind together with its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "config", rename_all = "camelCase")]
pub enum NodeOp {
    Input(InputConfig),
    Output(OutputConfig),
    Preview(PreviewConfig),
    Merge(MergeConfig),
    Split(SplitConfig),
    Rotate(RotateConfig),
    RemovePages(RemovePagesConfig),
    PageNumbers(PageNumbersConfig),
    Watermark(WatermarkConfig),
    Secure(SecureConfig),
    ImageToPdf(ImageToPdfConfig),
    PdfToImage(PdfToImageConfig),
    PdfToText(PdfToTextConfig),
    Metadata(MetadataConfig),
    AddImage(AddImageConfig),
    Flatten(FlattenConfig),
    RemoveBlankPages(RemoveBlankPagesConfig),
}

impl NodeOp {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeOp::Input(_) => NodeKind::Input,
            NodeOp::Output(_) => NodeKind::Output,
            NodeOp::Preview(_) => NodeKind::Preview,
            NodeOp::Merge(_) => NodeKind::Merge,
            NodeOp::Split(_) => NodeKind::Split,
            NodeOp::Rotate(_) => NodeKind::Rotate,
            NodeOp::RemovePages(_) => NodeKind::RemovePages,
            NodeOp::PageNumbers(_) => NodeKind::PageNumbers,
            NodeOp::Watermark(_) => NodeKind::Watermark,
            NodeOp::Secure(_) => NodeKind::Secure,
            NodeOp::ImageToPdf(_) => NodeKind::ImageToPdf,
            NodeOp::PdfToImage(_) => NodeKind::PdfToImage,
            NodeOp::PdfToText(_) => NodeKind::PdfToText,
            NodeOp::Metadata(_) => NodeKind::Metadata,
            NodeOp::AddImage(_) => NodeKind::AddImage,
            NodeOp::Flatten(_) => NodeKind::Flatten,
            NodeOp::RemoveBlankPages(_) => NodeKind::RemoveBlankPages,
        }
    }
}

/// A file source. The assigned file's class narrows what the node produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputConfig {
    pub file_id: Option<FileId>,
    pub file_name: Option<String>,
    pub file_type: Option<FileClass>,
}

/// What an output node delivers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    #[default]
    Auto,
    Pdf,
    Image,
    Text,
}

/// How an image export packages several rasters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageExportMode {
    #[default]
    Individual,
    SingleImage,
    Zip,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputConfig {
    pub file_type: ExportType,
    pub output_file_name: Option<String>,
    pub image_export_mode: ImageExportMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreviewConfig {
    /// 1-based page shown for PDF inputs.
    pub page_number: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { page_number: 1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    #[default]
    Range,
    ExtractAll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SplitConfig {
    pub mode: SplitMode,
    pub range: PageRange,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            mode: SplitMode::Range,
            range: PageRange::new("1"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RotateConfig {
    /// Clockwise delta; one of 90, 180, 270.
    pub degrees: i32,
    /// Pages to rotate; every page when absent or blank.
    pub pages: Option<PageRange>,
}

impl Default for RotateConfig {
    fn default() -> Self {
        Self {
            degrees: 90,
            pages: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemovePagesConfig {
    pub pages: PageRange,
}

/// Corner (or edge centre) a page number is anchored to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumberPosition {
    #[default]
    BottomCenter,
    BottomRight,
    BottomLeft,
    TopCenter,
    TopRight,
    TopLeft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageNumbersConfig {
    pub position: NumberPosition,
    pub start_number: u32,
    /// First labelled page, 1-based.
    pub start_from_page: Option<usize>,
    /// Last labelled page, 1-based, inclusive.
    pub end_at_page: Option<usize>,
    /// 1-based pages left unlabelled.
    pub skip_pages: Vec<usize>,
    /// A preset (`"1"`, `"1 / n"`, `"Page 1"`, `"Page 1 of n"`) or a template
    /// using `{n}` and `{total}`.
    pub format: String,
}

impl Default for PageNumbersConfig {
    fn default() -> Self {
        Self {
            position: NumberPosition::BottomCenter,
            start_number: 1,
            start_from_page: None,
            end_at_page: None,
            skip_pages: Vec::new(),
            format: "1".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WatermarkConfig {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecureConfig {
    pub user_password: Option<String>,
    pub owner_password: Option<String>,
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageToPdfConfig {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PdfToImageConfig {
    pub page_number: usize,
    pub scale: f32,
}

impl Default for PdfToImageConfig {
    fn default() -> Self {
        Self {
            page_number: 1,
            scale: 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfToTextConfig {}

/// Metadata fields as entered by the user; `keywords` is comma-separated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetadataConfig {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

impl MetadataConfig {
    /// The fields to write; keywords split and trimmed.
    pub fn to_metadata(&self) -> Metadata {
        Metadata {
            title: self.title.clone(),
            author: self.author.clone(),
            subject: self.subject.clone(),
            keywords: self.keywords.as_deref().map(Metadata::parse_keywords),
            creator: self.creator.clone(),
            producer: self.producer.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddImageConfig {
    /// Target page, 1-based.
    pub page_number: usize,
    pub x: f32,
    pub y: f32,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub scale: f32,
}

impl Default for AddImageConfig {
    fn default() -> Self {
        Self {
            page_number: 1,
            x: 0.0,
            y: 0.0,
            width: None,
            height: None,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlattenConfig {
    /// Render scale; the engine default when absent.
    pub scale: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoveBlankPagesConfig {}

// ── Node state ───────────────────────────────────────────────────────────

/// Execution state of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// The artifact(s) a node currently exposes to its consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeOutput {
    #[default]
    None,
    Single(FileId),
    Many(Vec<FileId>),
}

impl NodeOutput {
    pub fn from_ids(mut ids: Vec<FileId>, many: bool) -> Self {
        match (ids.len(), many) {
            (0, false) => NodeOutput::None,
            (1, false) => NodeOutput::Single(ids.remove(0)),
            _ => NodeOutput::Many(ids),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, NodeOutput::None)
    }

    pub fn ids(&self) -> Vec<FileId> {
        match self {
            NodeOutput::None => Vec::new(),
            NodeOutput::Single(id) => vec![id.clone()],
            NodeOutput::Many(ids) => ids.clone(),
        }
    }
}

/// One step of the processing graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub op: NodeOp,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "NodeOutput::is_none")]
    pub output: NodeOutput,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<NodeError>,
    /// Fingerprint of the config and inputs that produced `output`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<FileId>,
}

impl Node {
    pub fn new(id: impl Into<String>, op: NodeOp) -> Self {
        Self {
            id: id.into(),
            op,
            position: Position::default(),
            size: None,
            output: NodeOutput::None,
            status: NodeStatus::Idle,
            error: None,
            generation: None,
            preview: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.op.kind()
    }

    /// The primary output: the single file, or the first of a list.
    pub fn output_file_id(&self) -> Option<&FileId> {
        match &self.output {
            NodeOutput::None => None,
            NodeOutput::Single(id) => Some(id),
            NodeOutput::Many(ids) => ids.first(),
        }
    }

    pub fn output_file_ids(&self) -> Vec<FileId> {
        self.output.ids()
    }

    /// Forget any result and go back to `Idle`.
    pub(crate) fn reset(&mut self) {
        self.status = NodeStatus::Idle;
        self.error = None;
    }
}

/// A directed connection between two node handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    /// An edge whose id is derived from its endpoints.
    pub fn new(
        source: impl Into<String>,
        source_handle: Option<String>,
        target: impl Into<String>,
        target_handle: Option<String>,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        let id = format!(
            "e-{}{}-{}{}",
            source,
            source_handle.as_deref().map(|h| format!(":{h}")).unwrap_or_default(),
            target,
            target_handle.as_deref().map(|h| format!(":{h}")).unwrap_or_default(),
        );
        Self {
            id,
            source,
            source_handle,
            target,
            target_handle,
        }
    }

    /// Edge between default handles.
    pub fn simple(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(source, None, target, None)
    }

    pub fn to_handle(source: impl Into<String>, target: impl Into<String>, handle: &str) -> Self {
        Self::new(source, None, target, Some(handle.to_string()))
    }

    pub fn touches(&self, node: &str) -> bool {
        self.source == node || self.target == node
    }
}
