//! What a run did, node by node.

use crate::error::NodeError;
use crate::graph::NodeKind;
use crate::store::FileId;
use serde::{Deserialize, Serialize};

/// How a node settled in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOutcome {
    /// The transform ran and its result was committed.
    Succeeded,
    /// Config and inputs were unchanged; the previous output was kept.
    Reused,
    /// The transform (or input gathering) failed.
    Failed,
    /// The transform ran but the node changed, vanished or was cancelled
    /// before commit. Nothing was written.
    Discarded,
    /// Not dispatched: the same work was already in flight, or a producer
    /// did not settle in this run.
    Skipped,
}

impl NodeOutcome {
    /// Whether the node now exposes output from this run or an earlier one.
    pub fn is_success(self) -> bool {
        matches!(self, NodeOutcome::Succeeded | NodeOutcome::Reused)
    }
}

/// One node's line in a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub id: String,
    pub kind: NodeKind,
    pub outcome: NodeOutcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<FileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<NodeError>,
    pub duration_ms: u64,
}

/// Result of [`crate::planner::Planner::run`].
///
/// Node failures do not make the run fail; they are listed here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Every node the run considered, in execution order.
    pub nodes: Vec<NodeReport>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn node(&self, id: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn outcome(&self, id: &str) -> Option<NodeOutcome> {
        self.node(id).map(|n| n.outcome)
    }

    pub fn count(&self, outcome: NodeOutcome) -> usize {
        self.nodes.iter().filter(|n| n.outcome == outcome).count()
    }

    /// Nodes that succeeded or were reused.
    pub fn success_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.outcome.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes.iter().filter(|n| n.outcome == NodeOutcome::Failed)
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}
