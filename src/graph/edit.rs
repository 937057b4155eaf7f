//! Structural edits that rewire several edges at once: re-splicing around a
//! deleted node, and inserting a node into an edge it was dropped on.

use super::node::{Edge, Node, Size};
use super::Graph;
use crate::error::BoardError;
use tracing::debug;

/// Geometry policy for drop-on-edge detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplicePolicy {
    /// A node splices into an edge when its centre is closer than this to
    /// the segment joining the edge's endpoint centres.
    pub distance: f64,
    /// Size assumed for nodes that have not been measured.
    pub default_size: Size,
}

impl Default for SplicePolicy {
    fn default() -> Self {
        Self {
            distance: 50.0,
            default_size: Size::new(350.0, 200.0),
        }
    }
}

impl SplicePolicy {
    fn centre(&self, node: &Node) -> (f64, f64) {
        let size = node.size.unwrap_or(self.default_size);
        (node.position.x + size.width / 2.0, node.position.y + size.height / 2.0)
    }
}

impl Graph {
    /// Connect every former producer of a removed node to every former
    /// consumer, keeping the producer's source handle and the consumer's
    /// target handle.
    ///
    /// Pairs already joined by an identical edge, or joined earlier in the
    /// same batch, are skipped, as are pairs the graph rules reject (for
    /// instance two producers competing for one consumer handle).
    pub(crate) fn splice_around(&mut self, incoming: &[Edge], outgoing: &[Edge]) -> Vec<Edge> {
        let mut created = Vec::new();
        for inc in incoming {
            for out in outgoing {
                let candidate = Edge::new(
                    inc.source.clone(),
                    inc.source_handle.clone(),
                    out.target.clone(),
                    out.target_handle.clone(),
                );
                let duplicate = self
                    .edges
                    .iter()
                    .chain(created.iter())
                    .any(|e: &Edge| same_endpoints(e, &candidate));
                if duplicate {
                    continue;
                }
                match self.add_edge_replacing(candidate.clone(), outgoing) {
                    Ok(()) => created.push(candidate),
                    Err(e) => debug!(
                        "Splice {} → {} skipped: {}",
                        candidate.source, candidate.target, e
                    ),
                }
            }
        }
        created
    }

    /// If `node_id` was dropped onto an edge, route that edge through it.
    ///
    /// Only in-place kinds qualify. The first edge (in edge order) not
    /// touching the node whose centre-to-centre segment passes within
    /// [`SplicePolicy::distance`] of the node's centre is replaced by
    /// `source → node → target`. The edit is atomic: if either new edge is
    /// rejected the graph is left unchanged and the error returned.
    ///
    /// Returns the id of the replaced edge, or `None` when nothing was hit.
    pub fn on_node_dropped_on_edge(
        &mut self,
        node_id: &str,
        policy: &SplicePolicy,
    ) -> Result<Option<String>, BoardError> {
        let node = self
            .node(node_id)
            .ok_or_else(|| BoardError::UnknownNode(node_id.to_string()))?;
        if !node.kind().is_in_place() {
            return Ok(None);
        }
        let centre = policy.centre(node);

        let hit = self.edges.iter().find(|e| {
            if e.touches(node_id) {
                return false;
            }
            let (Some(s), Some(t)) = (self.node(&e.source), self.node(&e.target)) else {
                return false;
            };
            point_segment_distance(centre, policy.centre(s), policy.centre(t)) < policy.distance
        });
        let Some(hit) = hit.cloned() else {
            return Ok(None);
        };

        let snapshot = self.edges.clone();
        self.edges.retain(|e| e.id != hit.id);
        let former = std::slice::from_ref(&hit);
        let inbound = Edge::new(hit.source.clone(), hit.source_handle.clone(), node_id, None);
        let outbound = Edge::new(node_id, None, hit.target.clone(), hit.target_handle.clone());
        let result = self
            .add_edge(inbound)
            .and_then(|()| self.add_edge_replacing(outbound, former));
        match result {
            Ok(()) => {
                debug!("Node '{}' spliced into edge '{}'", node_id, hit.id);
                Ok(Some(hit.id))
            }
            Err(e) => {
                self.edges = snapshot;
                Err(e)
            }
        }
    }
}

fn same_endpoints(a: &Edge, b: &Edge) -> bool {
    a.source == b.source
        && a.target == b.target
        && a.source_handle == b.source_handle
        && a.target_handle == b.target_handle
}

/// Euclidean distance from `p` to the segment `a`–`b`.
fn point_segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}
