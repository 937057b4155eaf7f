//! The typed dataflow graph: nodes, edges and the rules that keep it valid.
//!
//! Every mutation is checked before it is applied. A rejected edit returns
//! a [`BoardError`] and leaves the graph exactly as it was, so callers never
//! have to roll anything back themselves.
//!
//! ## Why derived ports?
//!
//! Handle lists are never stored. Merge nodes grow a free `input-k` handle
//! whenever the last one is taken, and that list is recomputed from the
//! node's edges on every read ([`Graph::target_handles`]). A stored counter
//! would have to be kept in sync with every edge insert and delete.
//!
//! Editing a node's config or inputs resets it and everything downstream
//! to [`NodeStatus::Idle`]. Outputs are kept: the planner reuses them when
//! the node's fingerprint turns out not to have changed.

mod edit;
mod node;
pub mod ports;

pub use edit::SplicePolicy;
pub use node::{
    AddImageConfig, Edge, ExportType, FlattenConfig, ImageExportMode, ImageToPdfConfig, InputConfig,
    MergeConfig, MetadataConfig, Node, NodeKind, NodeOp, NodeOutput, NodeStatus, NumberPosition,
    OutputConfig, PageNumbersConfig, PdfToImageConfig, PdfToTextConfig, Position, PreviewConfig,
    RemoveBlankPagesConfig, RemovePagesConfig, RotateConfig, SecureConfig, Size, SplitConfig,
    SplitMode, WatermarkConfig,
};
pub use ports::{PortClasses, TargetPort};

use crate::error::BoardError;
use crate::store::{FileArtifact, FileId};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Nodes and edges of one board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    fn require(&self, id: &str) -> Result<&Node, BoardError> {
        self.node(id).ok_or_else(|| BoardError::UnknownNode(id.to_string()))
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Target handles of a node as currently visible, including merge growth.
    pub fn target_handles(&self, id: &str) -> Result<Vec<TargetPort>, BoardError> {
        let node = self.require(id)?;
        Ok(ports::target_ports(node.kind(), self.incoming(id)))
    }

    /// Classes a node produces, narrowed by its assigned file (inputs) or by
    /// whatever feeds it (previews).
    pub fn source_class(&self, id: &str) -> Result<PortClasses, BoardError> {
        self.require(id)?;
        Ok(self.source_class_inner(id, &mut HashSet::new()))
    }

    fn source_class_inner(&self, id: &str, seen: &mut HashSet<String>) -> PortClasses {
        let Some(node) = self.node(id) else {
            return PortClasses::NONE;
        };
        if !seen.insert(id.to_string()) {
            return ports::produces(node.kind());
        }
        match &node.op {
            NodeOp::Input(cfg) => match cfg.file_type {
                Some(class) => PortClasses::from_file_class(class),
                None => ports::produces(NodeKind::Input),
            },
            NodeOp::Preview(_) => match self.incoming(id).next() {
                Some(edge) => self.source_class_inner(&edge.source, seen),
                None => ports::produces(NodeKind::Preview),
            },
            op => ports::produces(op.kind()),
        }
    }

    /// Node ids strictly downstream of `id`.
    pub fn downstream(&self, id: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([id]);
        while let Some(cur) = queue.pop_front() {
            for e in self.outgoing(cur) {
                if seen.insert(e.target.clone()) {
                    queue.push_back(&e.target);
                }
            }
        }
        seen.remove(id);
        seen
    }

    /// Every artifact id the graph still points at: assigned input files,
    /// node outputs and previews. Feed to [`crate::store::FileStore::retain_referenced`].
    pub fn referenced_files(&self) -> HashSet<FileId> {
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if let NodeOp::Input(cfg) = &node.op {
                ids.extend(cfg.file_id.clone());
            }
            ids.extend(node.output_file_ids());
            ids.extend(node.preview.clone());
        }
        ids
    }

    /// Whether `to` is reachable from `from` along edges (or is `from`).
    fn reaches(&self, from: &str, to: &str) -> bool {
        from == to || self.downstream(from).contains(to)
    }

    // ── Validation ────────────────────────────────────────────────────────

    /// Whether `edge` could be added right now.
    pub fn is_valid_connection(&self, edge: &Edge) -> bool {
        self.check_edge(edge).is_ok()
    }

    /// Check every rule for a candidate edge without applying it.
    pub fn check_edge(&self, edge: &Edge) -> Result<(), BoardError> {
        self.check_edge_with(edge, &[])
    }

    /// [`Graph::check_edge`], deriving target handles as if the `former`
    /// edges were still attached. Splicing uses this so a merge keeps the
    /// handle an edge it replaces was plugged into.
    fn check_edge_with(&self, edge: &Edge, former: &[Edge]) -> Result<(), BoardError> {
        let source = self.require(&edge.source)?;
        let target = self.require(&edge.target)?;

        if !ports::has_source(source.kind()) || edge.source_handle.is_some() {
            return Err(BoardError::UnknownHandle {
                node: source.id.clone(),
                handle: edge.source_handle.clone().unwrap_or_else(|| "output".into()),
            });
        }

        let attached = self
            .incoming(&target.id)
            .chain(former.iter().filter(|e| e.target == target.id));
        let handles = ports::target_ports(target.kind(), attached);
        let Some(port) = handles.iter().find(|p| p.handle == edge.target_handle) else {
            return Err(BoardError::UnknownHandle {
                node: target.id.clone(),
                handle: edge.target_handle.clone().unwrap_or_else(|| "input".into()),
            });
        };

        let produced = self.source_class(&source.id)?;
        if !produced.intersects(port.accepts) {
            return Err(BoardError::IncompatiblePorts {
                source_node: source.id.clone(),
                target: target.id.clone(),
                handle: edge.target_handle.clone().unwrap_or_else(|| "input".into()),
                produced: produced.to_string(),
                accepted: port.accepts.to_string(),
            });
        }

        if self
            .incoming(&target.id)
            .any(|e| e.target_handle == edge.target_handle)
        {
            return Err(BoardError::PortOccupied {
                target: target.id.clone(),
                handle: edge.target_handle.clone().unwrap_or_else(|| "input".into()),
            });
        }

        if self.reaches(&target.id, &source.id) {
            return Err(BoardError::CycleDetected {
                source_node: source.id.clone(),
                target: target.id.clone(),
            });
        }
        Ok(())
    }

    // ── Mutations ─────────────────────────────────────────────────────────

    pub fn add_node(&mut self, node: Node) -> Result<(), BoardError> {
        if self.node(&node.id).is_some() {
            return Err(BoardError::DuplicateNode(node.id));
        }
        debug!("Graph: add node '{}' ({})", node.id, node.kind());
        self.nodes.push(node);
        Ok(())
    }

    /// Remove a node and its edges, then re-splice its neighbours.
    ///
    /// Returns the edges synthesised around the removed node.
    pub fn remove_node(&mut self, id: &str) -> Result<Vec<Edge>, BoardError> {
        self.require(id)?;
        let incoming: Vec<Edge> = self.incoming(id).cloned().collect();
        let outgoing: Vec<Edge> = self.outgoing(id).cloned().collect();
        let affected: HashSet<String> = self.downstream(id);

        self.edges.retain(|e| !e.touches(id));
        self.nodes.retain(|n| n.id != id);
        for n in &affected {
            self.reset_from(n);
        }

        let spliced = self.splice_around(&incoming, &outgoing);
        debug!("Graph: removed node '{}', spliced {} edges", id, spliced.len());
        Ok(spliced)
    }

    /// Replace a node's op. The kind must stay the same.
    pub fn update_config(&mut self, id: &str, op: NodeOp) -> Result<(), BoardError> {
        let current = self.require(id)?.kind();
        if op.kind() != current {
            return Err(BoardError::InvalidConfig(format!(
                "node '{}' is a {} node, not {}",
                id,
                current,
                op.kind()
            )));
        }
        if let Some(node) = self.node_mut(id) {
            node.op = op;
        }
        self.reset_from(id);
        Ok(())
    }

    /// Point an input node at a stored file; its class narrows the node's
    /// output type.
    pub fn assign_input_file(&mut self, id: &str, file: &FileArtifact) -> Result<(), BoardError> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| BoardError::UnknownNode(id.to_string()))?;
        let NodeOp::Input(cfg) = &mut node.op else {
            return Err(BoardError::InvalidConfig(format!("node '{}' is not an input node", id)));
        };
        cfg.file_id = Some(file.id.clone());
        cfg.file_name = Some(file.name.clone());
        cfg.file_type = Some(file.class());
        self.reset_from(id);
        Ok(())
    }

    pub fn add_edge(&mut self, edge: Edge) -> Result<(), BoardError> {
        self.add_edge_replacing(edge, &[])
    }

    /// Add `edge` in place of the already detached `former` edges.
    pub(crate) fn add_edge_replacing(
        &mut self,
        edge: Edge,
        former: &[Edge],
    ) -> Result<(), BoardError> {
        self.check_edge_with(&edge, former)?;
        debug!("Graph: add edge '{}'", edge.id);
        let target = edge.target.clone();
        self.edges.push(edge);
        self.reset_from(&target);
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<Edge, BoardError> {
        let pos = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| BoardError::UnknownEdge(id.to_string()))?;
        let edge = self.edges.remove(pos);
        self.reset_from(&edge.target);
        Ok(edge)
    }

    /// Connect `source` to the first free target handle that accepts it.
    pub fn connect(&mut self, source: &str, target: &str) -> Result<Edge, BoardError> {
        let mut first_err = None;
        for port in self.target_handles(target)? {
            let edge = Edge::new(source, None, target, port.handle);
            match self.check_edge(&edge) {
                Ok(()) => {
                    self.add_edge(edge.clone())?;
                    return Ok(edge);
                }
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        Err(first_err.unwrap_or_else(|| BoardError::UnknownHandle {
            node: target.to_string(),
            handle: "input".into(),
        }))
    }

    /// Reset `id` and everything downstream of it to `Idle`.
    pub(crate) fn reset_from(&mut self, id: &str) {
        let mut ids = self.downstream(id);
        ids.insert(id.to_string());
        for node in self.nodes.iter_mut().filter(|n| ids.contains(&n.id)) {
            node.reset();
        }
    }

    // ── Serialisation ─────────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, BoardError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BoardError::Internal(format!("graph serialisation: {}", e)))
    }

    /// Parse a graph and re-validate it: node ids must be unique and every
    /// edge must pass the same checks as [`Graph::add_edge`].
    pub fn from_json(json: &str) -> Result<Self, BoardError> {
        let raw: Graph =
            serde_json::from_str(json)
                .map_err(|e| BoardError::InvalidConfig(format!("graph JSON: {}", e)))?;
        let mut graph = Graph::new();
        for node in raw.nodes {
            graph.add_node(node)?;
        }
        for edge in raw.edges {
            graph.check_edge(&edge)?;
            graph.edges.push(edge);
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: NodeKind) -> Node {
        Node::new(id, kind.default_op())
    }

    fn pdf_input(id: &str) -> Node {
        Node::new(
            id,
            NodeOp::Input(InputConfig {
                file_id: Some(FileId::from("f")),
                file_name: Some("a.pdf".into()),
                file_type: Some(crate::store::FileClass::Pdf),
            }),
        )
    }

    fn image_input(id: &str) -> Node {
        Node::new(
            id,
            NodeOp::Input(InputConfig {
                file_type: Some(crate::store::FileClass::Image),
                ..Default::default()
            }),
        )
    }

    fn chain() -> Graph {
        let mut g = Graph::new();
        g.add_node(pdf_input("a")).unwrap();
        g.add_node(node("b", NodeKind::Rotate)).unwrap();
        g.add_node(node("c", NodeKind::Output)).unwrap();
        g.add_edge(Edge::simple("a", "b")).unwrap();
        g.add_edge(Edge::simple("b", "c")).unwrap();
        g
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut g = Graph::new();
        g.add_node(node("x", NodeKind::Merge)).unwrap();
        assert!(matches!(
            g.add_node(node("x", NodeKind::Split)),
            Err(BoardError::DuplicateNode(_))
        ));
    }

    #[test]
    fn pdf_to_image_only_handle_is_rejected() {
        let mut g = Graph::new();
        g.add_node(pdf_input("a")).unwrap();
        g.add_node(node("i", NodeKind::ImageToPdf)).unwrap();
        let before = g.edges().to_vec();
        assert!(matches!(
            g.add_edge(Edge::simple("a", "i")),
            Err(BoardError::IncompatiblePorts { .. })
        ));
        assert_eq!(g.edges(), before.as_slice());
    }

    #[test]
    fn add_image_handles_are_typed() {
        let mut g = Graph::new();
        g.add_node(pdf_input("p")).unwrap();
        g.add_node(image_input("i")).unwrap();
        g.add_node(node("x", NodeKind::AddImage)).unwrap();
        assert!(!g.is_valid_connection(&Edge::to_handle("p", "x", ports::INPUT_IMAGE)));
        assert!(!g.is_valid_connection(&Edge::to_handle("i", "x", ports::INPUT_PDF)));
        g.add_edge(Edge::to_handle("p", "x", ports::INPUT_PDF)).unwrap();
        g.add_edge(Edge::to_handle("i", "x", ports::INPUT_IMAGE)).unwrap();
    }

    #[test]
    fn unassigned_input_is_ambiguous() {
        let mut g = Graph::new();
        g.add_node(node("in", NodeKind::Input)).unwrap();
        g.add_node(node("i", NodeKind::ImageToPdf)).unwrap();
        g.add_node(node("r", NodeKind::Rotate)).unwrap();
        assert!(g.is_valid_connection(&Edge::simple("in", "i")));
        assert!(g.is_valid_connection(&Edge::simple("in", "r")));
    }

    #[test]
    fn text_only_reaches_output_and_preview() {
        let mut g = Graph::new();
        g.add_node(pdf_input("a")).unwrap();
        g.add_node(node("t", NodeKind::PdfToText)).unwrap();
        g.add_node(node("r", NodeKind::Rotate)).unwrap();
        g.add_node(node("p", NodeKind::Preview)).unwrap();
        g.add_node(node("o", NodeKind::Output)).unwrap();
        g.add_edge(Edge::simple("a", "t")).unwrap();
        assert!(!g.is_valid_connection(&Edge::simple("t", "r")));
        g.add_edge(Edge::simple("t", "p")).unwrap();
        assert_eq!(g.source_class("p").unwrap(), PortClasses::TEXT);
        g.add_edge(Edge::simple("p", "o")).unwrap();
    }

    #[test]
    fn occupied_handle_rejected() {
        let mut g = chain();
        g.add_node(pdf_input("z")).unwrap();
        assert!(matches!(
            g.add_edge(Edge::simple("z", "b")),
            Err(BoardError::PortOccupied { .. })
        ));
    }

    #[test]
    fn cycle_rejected() {
        let mut g = Graph::new();
        g.add_node(pdf_input("a")).unwrap();
        g.add_node(node("r1", NodeKind::Rotate)).unwrap();
        g.add_node(node("m", NodeKind::Merge)).unwrap();
        g.add_edge(Edge::simple("a", "r1")).unwrap();
        g.add_edge(Edge::to_handle("r1", "m", "input-0")).unwrap();
        g.add_node(node("r2", NodeKind::Rotate)).unwrap();
        g.add_edge(Edge::simple("m", "r2")).unwrap();
        assert!(matches!(
            g.add_edge(Edge::to_handle("r2", "m", "input-1")),
            Err(BoardError::CycleDetected { .. })
        ));
        assert!(matches!(
            g.add_edge(Edge::to_handle("m", "m", "input-1")),
            Err(BoardError::CycleDetected { .. })
        ));
    }

    #[test]
    fn merge_handles_grow_as_edges_connect() {
        let mut g = Graph::new();
        for id in ["a", "b", "c"] {
            g.add_node(pdf_input(id)).unwrap();
        }
        g.add_node(node("m", NodeKind::Merge)).unwrap();
        assert_eq!(g.target_handles("m").unwrap().len(), 2);
        assert!(!g.is_valid_connection(&Edge::to_handle("a", "m", "input-2")));

        let e1 = g.connect("a", "m").unwrap();
        assert_eq!(e1.target_handle.as_deref(), Some("input-0"));
        let e2 = g.connect("b", "m").unwrap();
        assert_eq!(e2.target_handle.as_deref(), Some("input-1"));
        assert_eq!(g.target_handles("m").unwrap().len(), 3);
        let e3 = g.connect("c", "m").unwrap();
        assert_eq!(e3.target_handle.as_deref(), Some("input-2"));
        assert_eq!(g.target_handles("m").unwrap().len(), 4);
    }

    #[test]
    fn delete_splices_a_to_c() {
        let mut g = chain();
        let spliced = g.remove_node("b").unwrap();
        assert_eq!(spliced.len(), 1);
        assert_eq!(g.edges().len(), 1);
        assert_eq!((g.edges()[0].source.as_str(), g.edges()[0].target.as_str()), ("a", "c"));
        assert!(g.edges().iter().all(|e| !e.touches("b")));
    }

    #[test]
    fn update_config_resets_downstream() {
        let mut g = chain();
        for n in &mut g.nodes {
            n.status = NodeStatus::Succeeded;
        }
        g.update_config("b", NodeOp::Rotate(RotateConfig { degrees: 180, pages: None }))
            .unwrap();
        assert_eq!(g.node("a").unwrap().status, NodeStatus::Succeeded);
        assert_eq!(g.node("b").unwrap().status, NodeStatus::Idle);
        assert_eq!(g.node("c").unwrap().status, NodeStatus::Idle);
        assert!(g.update_config("b", NodeKind::Merge.default_op()).is_err());
    }

    #[test]
    fn assign_file_narrows_class() {
        let mut g = Graph::new();
        g.add_node(node("in", NodeKind::Input)).unwrap();
        let png_magic = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
        let file = FileArtifact::new(FileId::from("x"), "scan.png", png_magic);
        g.assign_input_file("in", &file).unwrap();
        assert_eq!(g.source_class("in").unwrap(), PortClasses::IMAGE);
    }

    #[test]
    fn json_round_trip_revalidates() {
        let g = chain();
        let json = g.to_json().unwrap();
        assert_eq!(Graph::from_json(&json).unwrap(), g);

        let bad = json.replace("\"target\": \"c\"", "\"target\": \"nope\"");
        assert!(matches!(Graph::from_json(&bad), Err(BoardError::UnknownNode(_))));
    }
}
