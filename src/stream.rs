//! Streaming execution API: emit node events as the planner settles them.
//!
//! ## Why stream?
//!
//! A run over a large graph can take a while, and nodes finish in whatever
//! order the workers allow. A stream lets callers refresh a UI node by node
//! or log progress without implementing [`ExecutionProgressCallback`].
//!
//! Unlike the eager [`crate::planner::Planner::run`], which returns only
//! after every node settled, [`run_stream`] yields [`NodeEvent`]s as they
//! happen and ends with exactly one `RunFinished` or `RunFailed`.

use crate::planner::{Planner, RunReport, SharedGraph};
use crate::progress::ExecutionProgressCallback;
use crate::store::FileStore;
use serde::Serialize;
use std::pin::Pin;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

/// One step of a streamed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum NodeEvent {
    RunStarted { total: usize },
    NodeStarted { id: String, kind: String },
    NodeCompleted { id: String, outputs: usize },
    NodeFailed { id: String, error: String },
    RunFinished { report: RunReport },
    /// The run could not start or a planner task died.
    RunFailed { error: String },
}

/// A boxed stream of node events.
pub type NodeEventStream = Pin<Box<dyn Stream<Item = NodeEvent> + Send>>;

/// Execute `graph` in the background, streaming events as nodes settle.
///
/// The run keeps going if the stream is dropped; only the events are lost.
/// Any progress callback configured on the planner is bypassed.
///
/// # Example
/// ```rust,no_run
/// use pdfboard::{run_stream, shared, FileStore, Graph, NodeEvent, Planner};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() {
/// let planner = Planner::new(Default::default());
/// let graph = shared(Graph::new());
/// let mut events = run_stream(&planner, graph, FileStore::new());
/// while let Some(event) = events.next().await {
///     if let NodeEvent::NodeFailed { id, error } = &event {
///         eprintln!("{id}: {error}");
///     }
/// }
/// # }
/// ```
pub fn run_stream(planner: &Planner, graph: SharedGraph, store: FileStore) -> NodeEventStream {
    let (tx, rx) = unbounded_channel();
    let planner = planner.clone();
    tokio::spawn(async move {
        let forward = Forward(tx.clone());
        let last = match planner.run_observed(&graph, &store, &forward).await {
            Ok(report) => NodeEvent::RunFinished { report },
            Err(e) => NodeEvent::RunFailed { error: e.to_string() },
        };
        if tx.send(last).is_err() {
            debug!("Event stream dropped before the run finished");
        }
    });
    Box::pin(UnboundedReceiverStream::new(rx))
}

/// Forwards callback events into the channel; a closed receiver is ignored.
struct Forward(UnboundedSender<NodeEvent>);

impl Forward {
    fn emit(&self, event: NodeEvent) {
        let _ = self.0.send(event);
    }
}

impl ExecutionProgressCallback for Forward {
    fn on_run_start(&self, total_nodes: usize) {
        self.emit(NodeEvent::RunStarted { total: total_nodes });
    }

    fn on_node_start(&self, node_id: &str, kind: &str) {
        self.emit(NodeEvent::NodeStarted {
            id: node_id.to_string(),
            kind: kind.to_string(),
        });
    }

    fn on_node_complete(&self, node_id: &str, outputs: usize) {
        self.emit(NodeEvent::NodeCompleted {
            id: node_id.to_string(),
            outputs,
        });
    }

    fn on_node_error(&self, node_id: &str, error: &str) {
        self.emit(NodeEvent::NodeFailed {
            id: node_id.to_string(),
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::render::tests::FlatRenderer;
    use crate::config::EngineConfig;
    use crate::document::testutil::sample_pdf;
    use crate::graph::{Graph, Node, NodeKind};
    use crate::planner::shared;
    use futures::StreamExt;
    use std::sync::Arc;

    fn planner() -> Planner {
        Planner::new(EngineConfig::builder().renderer(Arc::new(FlatRenderer)).build().unwrap())
    }

    #[tokio::test]
    async fn events_bracket_the_run() {
        let store = FileStore::new();
        let mut g = Graph::new();
        g.add_node(Node::new("in", NodeKind::Input.default_op())).unwrap();
        let file = store.get(&store.add("a.pdf", sample_pdf(1))).unwrap();
        g.assign_input_file("in", &file).unwrap();
        g.add_node(Node::new("rot", NodeKind::Rotate.default_op())).unwrap();
        g.connect("in", "rot").unwrap();

        let events: Vec<NodeEvent> = run_stream(&planner(), shared(g), store).collect().await;
        assert_eq!(events.first(), Some(&NodeEvent::RunStarted { total: 2 }));
        assert!(events.contains(&NodeEvent::NodeCompleted {
            id: "rot".into(),
            outputs: 1
        }));
        match events.last() {
            Some(NodeEvent::RunFinished { report }) => assert!(report.is_clean()),
            other => panic!("unexpected last event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failures_are_streamed() {
        let mut g = Graph::new();
        g.add_node(Node::new("in", NodeKind::Input.default_op())).unwrap();
        let events: Vec<NodeEvent> = run_stream(&planner(), shared(g), FileStore::new())
            .collect()
            .await;
        assert!(events
            .iter()
            .any(|e| matches!(e, NodeEvent::NodeFailed { id, .. } if id == "in")));
    }

    #[test]
    fn events_serialise_tagged() {
        let json = serde_json::to_string(&NodeEvent::RunStarted { total: 3 }).unwrap();
        assert_eq!(json, r#"{"event":"runStarted","total":3}"#);
    }
}
