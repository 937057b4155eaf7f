//! Port signatures: which handles a kind exposes and what each accepts.
//!
//! Every kind has at most one source handle (the default, unnamed one).
//! Target handles are fixed per kind except for merge, whose handle list is
//! a pure function of its connected edges (see [`merge_handle_count`]).

use super::node::{Edge, NodeKind};
use crate::store::FileClass;
use std::fmt;

pub const INPUT_PDF: &str = "input-pdf";
pub const INPUT_IMAGE: &str = "input-image";
const MERGE_PREFIX: &str = "input-";

/// A set of semantic data classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PortClasses(u8);

impl PortClasses {
    pub const NONE: PortClasses = PortClasses(0);
    pub const PDF: PortClasses = PortClasses(0b001);
    pub const IMAGE: PortClasses = PortClasses(0b010);
    pub const TEXT: PortClasses = PortClasses(0b100);
    pub const ANY: PortClasses = PortClasses(0b111);

    pub const fn union(self, other: PortClasses) -> PortClasses {
        PortClasses(self.0 | other.0)
    }

    pub fn intersects(self, other: PortClasses) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn from_file_class(class: FileClass) -> PortClasses {
        match class {
            FileClass::Pdf => PortClasses::PDF,
            FileClass::Image => PortClasses::IMAGE,
            FileClass::Text => PortClasses::TEXT,
            FileClass::Other => PortClasses::NONE,
        }
    }
}

impl fmt::Display for PortClasses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (PortClasses::PDF, "PDF"),
            (PortClasses::IMAGE, "IMAGE"),
            (PortClasses::TEXT, "TEXT"),
        ]
        .into_iter()
        .filter(|(c, _)| self.intersects(*c))
        .map(|(_, n)| n)
        .collect();
        if names.is_empty() {
            f.write_str("nothing")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// A target handle and the classes it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPort {
    pub handle: Option<String>,
    pub accepts: PortClasses,
}

impl TargetPort {
    fn default_handle(accepts: PortClasses) -> Self {
        Self { handle: None, accepts }
    }

    fn named(handle: impl Into<String>, accepts: PortClasses) -> Self {
        Self {
            handle: Some(handle.into()),
            accepts,
        }
    }
}

/// Whether the kind has an output handle at all.
pub fn has_source(kind: NodeKind) -> bool {
    kind != NodeKind::Output
}

/// What the kind produces, before any narrowing by assigned files or
/// upstream classes.
pub fn produces(kind: NodeKind) -> PortClasses {
    match kind {
        NodeKind::Output => PortClasses::NONE,
        NodeKind::Input | NodeKind::Preview => PortClasses::PDF.union(PortClasses::IMAGE),
        NodeKind::PdfToImage => PortClasses::IMAGE,
        NodeKind::PdfToText => PortClasses::TEXT,
        NodeKind::Merge
        | NodeKind::Split
        | NodeKind::Rotate
        | NodeKind::RemovePages
        | NodeKind::PageNumbers
        | NodeKind::Watermark
        | NodeKind::Secure
        | NodeKind::ImageToPdf
        | NodeKind::Metadata
        | NodeKind::AddImage
        | NodeKind::Flatten
        | NodeKind::RemoveBlankPages => PortClasses::PDF,
    }
}

/// Target handles of `kind`. `edges` are the edges entering the node; they
/// only matter for merge.
pub fn target_ports<'a>(
    kind: NodeKind,
    edges: impl IntoIterator<Item = &'a Edge>,
) -> Vec<TargetPort> {
    match kind {
        NodeKind::Input => vec![],
        NodeKind::Output | NodeKind::Preview => vec![TargetPort::default_handle(PortClasses::ANY)],
        NodeKind::ImageToPdf => vec![TargetPort::default_handle(PortClasses::IMAGE)],
        NodeKind::AddImage => vec![
            TargetPort::named(INPUT_PDF, PortClasses::PDF),
            TargetPort::named(INPUT_IMAGE, PortClasses::IMAGE),
        ],
        NodeKind::Merge => (0..merge_handle_count(edges))
            .map(|i| TargetPort::named(merge_handle(i), PortClasses::PDF))
            .collect(),
        NodeKind::Split
        | NodeKind::Rotate
        | NodeKind::RemovePages
        | NodeKind::PageNumbers
        | NodeKind::Watermark
        | NodeKind::Secure
        | NodeKind::PdfToImage
        | NodeKind::PdfToText
        | NodeKind::Metadata
        | NodeKind::Flatten
        | NodeKind::RemoveBlankPages => vec![TargetPort::default_handle(PortClasses::PDF)],
    }
}

pub fn merge_handle(index: usize) -> String {
    format!("{MERGE_PREFIX}{index}")
}

/// Index of a merge handle: `"input-3"` → `3`.
pub fn merge_index(handle: &str) -> Option<usize> {
    handle.strip_prefix(MERGE_PREFIX)?.parse().ok()
}

/// Number of merge handles: one past the highest connected index, plus a
/// free slot, and never fewer than two.
pub fn merge_handle_count<'a>(edges: impl IntoIterator<Item = &'a Edge>) -> usize {
    let highest = edges
        .into_iter()
        .filter_map(|e| e.target_handle.as_deref().and_then(merge_index))
        .max();
    match highest {
        Some(h) => (h + 2).max(2),
        None => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge_edge(source: &str, index: usize) -> Edge {
        Edge::to_handle(source, "m", &merge_handle(index))
    }

    #[test]
    fn merge_starts_with_two_handles() {
        assert_eq!(merge_handle_count(&[] as &[Edge]), 2);
        assert_eq!(merge_handle_count(&[merge_edge("a", 0)]), 2);
    }

    #[test]
    fn merge_grows_one_past_highest_connected() {
        assert_eq!(merge_handle_count(&[merge_edge("a", 0), merge_edge("b", 1)]), 3);
        assert_eq!(merge_handle_count(&[merge_edge("a", 4)]), 6);
        let ports = target_ports(NodeKind::Merge, &[merge_edge("a", 1)]);
        let names: Vec<_> = ports.iter().filter_map(|p| p.handle.clone()).collect();
        assert_eq!(names, ["input-0", "input-1", "input-2"]);
    }

    #[test]
    fn merge_index_parses_only_input_handles() {
        assert_eq!(merge_index("input-12"), Some(12));
        assert_eq!(merge_index("input-pdf"), None);
        assert_eq!(merge_index("output"), None);
    }

    #[test]
    fn add_image_has_typed_handles() {
        let ports = target_ports(NodeKind::AddImage, &[] as &[Edge]);
        assert_eq!(ports[0].handle.as_deref(), Some(INPUT_PDF));
        assert_eq!(ports[0].accepts, PortClasses::PDF);
        assert_eq!(ports[1].accepts, PortClasses::IMAGE);
    }

    #[test]
    fn class_display() {
        assert_eq!(PortClasses::PDF.union(PortClasses::TEXT).to_string(), "PDF|TEXT");
        assert_eq!(PortClasses::NONE.to_string(), "nothing");
    }

    #[test]
    fn every_kind_but_output_produces_something() {
        for kind in NodeKind::ALL {
            assert_eq!(has_source(kind), !produces(kind).is_empty(), "{kind}");
        }
    }
}
