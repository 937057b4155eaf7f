//! The execution planner: run every node reachable from an input, in
//! dependency order, as concurrently as the graph allows.
//!
//! ```text
//!  graph snapshot ──► ExecutionPlan (Kahn order, dependency counts)
//!                          │
//!        ready node ───────┤ prepare: gather inputs, fingerprint
//!                          │   ├─ unchanged + outputs stored ─► Reused
//!                          │   ├─ same work already running ──► Skipped
//!                          │   └─ dispatch ─► spawn_blocking(transform)
//!                          │                        │
//!        dependents ◄──────┴── commit ◄─────────────┘
//!                              (re-read node; discard if removed,
//!                               changed or cancelled)
//! ```
//!
//! ## Why a generation check at commit?
//!
//! The graph stays editable while transforms run: the lock is only taken
//! to read inputs and to write results, never across a transform. A result
//! is therefore written only if the node still exists and its fingerprint
//! (config plus resolved input ids) is the one the work started from.
//! Anything else is stale and dropped without touching the store.
//!
//! ## Why per-node cancellation tokens?
//!
//! Runs may overlap. When a newer run reaches a node whose older version is
//! still in flight, it cancels the old token; the old run then discards
//! whatever the worker returns. Work already on the blocking pool is not
//! interrupted, only ignored.

mod order;
mod report;

pub use report::{NodeOutcome, NodeReport, RunReport};

use self::order::ExecutionPlan;
use crate::codec::PageRenderer;
use crate::config::EngineConfig;
use crate::error::{BoardError, NodeError};
use crate::graph::{Graph, Node, NodeKind, NodeOp, NodeOutput, NodeStatus};
use crate::progress::{ExecutionProgressCallback, NoopProgressCallback};
use crate::store::{FileId, FileStore};
use crate::transform::{self, NodeInput, TransformContext, TransformOutput};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A graph shared between editors and the planner.
pub type SharedGraph = Arc<RwLock<Graph>>;

/// Wrap a graph for use with [`Planner::run`].
pub fn shared(graph: Graph) -> SharedGraph {
    Arc::new(RwLock::new(graph))
}

/// Drop stored artifacts that no node references any more, such as outputs
/// superseded by a re-run. Returns how many were removed.
pub async fn prune_store(graph: &SharedGraph, store: &FileStore) -> usize {
    let referenced = graph.read().await.referenced_files();
    let removed = store.retain_referenced(&referenced);
    if removed > 0 {
        debug!("Pruned {} unreferenced artifact(s)", removed);
    }
    removed
}

struct InFlight {
    fingerprint: String,
    token: CancellationToken,
    /// Distinguishes this dispatch from later ones of the same node.
    ticket: u64,
}

/// Executes graphs. Cloning shares the worker limit and the in-flight table,
/// so clones cooperate on re-entrancy.
#[derive(Clone)]
pub struct Planner {
    config: EngineConfig,
    in_flight: Arc<DashMap<String, InFlight>>,
    tickets: Arc<AtomicU64>,
    permits: Arc<Semaphore>,
}

impl fmt::Debug for Planner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Planner")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl Planner {
    pub fn new(config: EngineConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            config,
            in_flight: Arc::new(DashMap::new()),
            tickets: Arc::new(AtomicU64::new(0)),
            permits,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cancel the in-flight execution of `node_id`, if any. Its result
    /// will be discarded.
    pub fn cancel(&self, node_id: &str) -> bool {
        match self.in_flight.get(node_id) {
            Some(entry) => {
                info!("Cancelling in-flight execution of '{}'", node_id);
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, node_id: &str) -> bool {
        self.in_flight.contains_key(node_id)
    }

    /// Execute every node reachable from an input node.
    ///
    /// # Returns
    /// `Ok(RunReport)` once every reachable node has settled, even if some
    /// of them failed (check [`RunReport::failures`]).
    ///
    /// # Errors
    /// Returns `Err(BoardError)` only when the graph cannot be ordered
    /// (a cycle in a graph loaded without validation) or a planner task
    /// itself dies.
    pub async fn run(
        &self,
        graph: &SharedGraph,
        store: &FileStore,
    ) -> Result<RunReport, BoardError> {
        let observer: Arc<dyn ExecutionProgressCallback> = match &self.config.progress_callback {
            Some(cb) => Arc::clone(cb),
            None => Arc::new(NoopProgressCallback),
        };
        self.run_observed(graph, store, observer.as_ref()).await
    }

    pub(crate) async fn run_observed(
        &self,
        graph: &SharedGraph,
        store: &FileStore,
        observer: &dyn ExecutionProgressCallback,
    ) -> Result<RunReport, BoardError> {
        let run_start = Instant::now();
        let plan = {
            let g = graph.read().await;
            ExecutionPlan::build(&g)?
        };
        info!("Starting run over {} reachable nodes", plan.len());
        observer.on_run_start(plan.len());

        let mut progress = Progress::new(&plan);
        let mut tasks: JoinSet<Finished> = JoinSet::new();

        loop {
            while let Some(id) = progress.ready.pop_front() {
                match self.prepare(&id, graph, store, &plan, &progress.settled, observer).await {
                    Prepared::Settled(report) => progress.settle(&plan, report),
                    Prepared::Dispatch(job) => {
                        tasks.spawn(self.execute(job));
                    }
                }
            }
            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let finished =
                joined.map_err(|e| BoardError::Internal(format!("planner task failed: {}", e)))?;
            let report = self.commit(finished, graph, store, observer).await;
            progress.settle(&plan, report);
        }

        let mut nodes = progress.reports;
        nodes.sort_by_key(|r| plan.position(&r.id).unwrap_or(usize::MAX));
        let report = RunReport {
            nodes,
            duration_ms: run_start.elapsed().as_millis() as u64,
        };
        info!(
            "Run complete: {}/{} nodes succeeded or reused, {} failed, {}ms",
            report.success_count(),
            plan.len(),
            report.count(NodeOutcome::Failed),
            report.duration_ms
        );
        observer.on_run_complete(plan.len(), report.success_count());
        Ok(report)
    }

    // ── Per-node steps ───────────────────────────────────────────────────

    async fn prepare(
        &self,
        id: &str,
        graph: &SharedGraph,
        store: &FileStore,
        plan: &ExecutionPlan,
        settled: &HashMap<String, NodeOutcome>,
        observer: &dyn ExecutionProgressCallback,
    ) -> Prepared {
        let started = Instant::now();
        let kind = plan.kinds.get(id).copied().unwrap_or(NodeKind::Input);
        let line = |outcome, outputs, error| NodeReport {
            id: id.to_string(),
            kind,
            outcome,
            outputs,
            error,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        let unsettled = plan.upstream.get(id).into_iter().flatten().find(|u| {
            matches!(
                settled.get(u.as_str()),
                Some(NodeOutcome::Skipped | NodeOutcome::Discarded)
            )
        });
        if let Some(producer) = unsettled {
            debug!("Skipping '{}': producer '{}' did not settle", id, producer);
            return Prepared::Settled(line(NodeOutcome::Skipped, Vec::new(), None));
        }

        let (op, fingerprint, gathered, reusable) = {
            let g = graph.read().await;
            let Some(node) = g.node(id) else {
                debug!("Skipping '{}': removed before dispatch", id);
                return Prepared::Settled(line(NodeOutcome::Skipped, Vec::new(), None));
            };
            let fingerprint = fingerprint(&g, node);
            let reusable = node.generation.as_deref() == Some(fingerprint.as_str())
                && node.status != NodeStatus::Failed
                && !node.output.is_none()
                && node.output_file_ids().iter().all(|f| store.contains(f));
            let gathered = if reusable {
                Ok(Vec::new())
            } else {
                gather(&g, node, store, settled)
            };
            (node.op.clone(), fingerprint, gathered, reusable)
        };

        if reusable {
            let mut g = graph.write().await;
            let outputs = match g.node_mut(id) {
                Some(node) => {
                    node.status = NodeStatus::Succeeded;
                    node.error = None;
                    node.output_file_ids()
                }
                None => Vec::new(),
            };
            debug!("Reusing '{}' ({} outputs)", id, outputs.len());
            observer.on_node_complete(id, outputs.len());
            return Prepared::Settled(line(NodeOutcome::Reused, outputs, None));
        }

        let inputs = match gathered {
            Ok(inputs) => inputs,
            Err(e) => {
                record_failure(&mut *graph.write().await, id, &e);
                warn!("Node '{}' failed: {}", id, e);
                observer.on_node_error(id, &e.to_string());
                return Prepared::Settled(line(NodeOutcome::Failed, Vec::new(), Some(e)));
            }
        };

        let token = CancellationToken::new();
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        let entry = InFlight {
            fingerprint: fingerprint.clone(),
            token: token.clone(),
            ticket,
        };
        match self.in_flight.entry(id.to_string()) {
            Entry::Occupied(mut running) => {
                if running.get().fingerprint == fingerprint {
                    debug!("Skipping '{}': identical work already in flight", id);
                    return Prepared::Settled(line(NodeOutcome::Skipped, Vec::new(), None));
                }
                info!("Cancelling stale execution of '{}'", id);
                running.get().token.cancel();
                running.insert(entry);
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }

        if let Some(node) = graph.write().await.node_mut(id) {
            node.status = NodeStatus::Running;
            node.error = None;
        }
        debug!("Dispatching '{}' ({}) with {} input(s)", id, kind, inputs.len());
        observer.on_node_start(id, kind.wire_name());
        Prepared::Dispatch(Job {
            id: id.to_string(),
            kind,
            op,
            inputs,
            fingerprint,
            token,
            ticket,
            started,
        })
    }

    fn execute(&self, job: Job) -> impl std::future::Future<Output = Finished> + Send + 'static {
        let permits = Arc::clone(&self.permits);
        let renderer = Arc::clone(&self.config.renderer);
        let scales = (self.config.render_scale, self.config.preview_scale);
        async move {
            let Job {
                id,
                kind,
                op,
                inputs,
                fingerprint,
                token,
                ticket,
                started,
            } = job;
            let result = tokio::select! {
                _ = token.cancelled() => None,
                result = run_transform(permits, renderer, scales, op, inputs) => Some(result),
            };
            Finished {
                id,
                kind,
                fingerprint,
                token,
                ticket,
                started,
                result,
            }
        }
    }

    async fn commit(
        &self,
        finished: Finished,
        graph: &SharedGraph,
        store: &FileStore,
        observer: &dyn ExecutionProgressCallback,
    ) -> NodeReport {
        let Finished {
            id,
            kind,
            fingerprint: started_from,
            token,
            ticket,
            started,
            result,
        } = finished;
        self.in_flight.remove_if(&id, |_, f| f.ticket == ticket);
        let line = |outcome, outputs, error| NodeReport {
            id: id.clone(),
            kind,
            outcome,
            outputs,
            error,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        let mut g = graph.write().await;
        let current = g.node(&id).map(|n| fingerprint(&g, n));
        let stale = match (&result, current) {
            (None, _) => Some("cancelled"),
            (_, None) => Some("node was removed"),
            (_, Some(fp)) if fp != started_from => Some("config or inputs changed"),
            _ if token.is_cancelled() => Some("cancelled"),
            _ => None,
        };
        if let Some(reason) = stale {
            warn!("Discarding result of '{}': {}", id, reason);
            let idle = !self.in_flight.contains_key(&id);
            let running = g
                .node_mut(&id)
                .filter(|n| idle && n.status == NodeStatus::Running);
            if let Some(node) = running {
                node.status = NodeStatus::Idle;
            }
            return line(NodeOutcome::Discarded, Vec::new(), None);
        }

        match result {
            Some(Ok(out)) => {
                let outputs = store_output(store, out, &mut g, &id, started_from);
                debug!("Committed '{}' → {} file(s)", id, outputs.len());
                observer.on_node_complete(&id, outputs.len());
                line(NodeOutcome::Succeeded, outputs, None)
            }
            Some(Err(e)) => {
                record_failure(&mut g, &id, &e);
                warn!("Node '{}' failed: {}", id, e);
                observer.on_node_error(&id, &e.to_string());
                line(NodeOutcome::Failed, Vec::new(), Some(e))
            }
            None => line(NodeOutcome::Discarded, Vec::new(), None),
        }
    }
}

// ── Run bookkeeping ──────────────────────────────────────────────────────

enum Prepared {
    Settled(NodeReport),
    Dispatch(Job),
}

struct Job {
    id: String,
    kind: NodeKind,
    op: NodeOp,
    inputs: Vec<NodeInput>,
    fingerprint: String,
    token: CancellationToken,
    ticket: u64,
    started: Instant,
}

struct Finished {
    id: String,
    kind: NodeKind,
    fingerprint: String,
    token: CancellationToken,
    ticket: u64,
    started: Instant,
    /// `None` when cancelled before the worker returned.
    result: Option<Result<TransformOutput, NodeError>>,
}

struct Progress {
    remaining: HashMap<String, usize>,
    settled: HashMap<String, NodeOutcome>,
    ready: VecDeque<String>,
    reports: Vec<NodeReport>,
}

impl Progress {
    fn new(plan: &ExecutionPlan) -> Self {
        let remaining: HashMap<String, usize> = plan
            .upstream
            .iter()
            .map(|(id, ups)| (id.clone(), ups.len()))
            .collect();
        let ready = plan
            .order
            .iter()
            .filter(|id| remaining.get(id.as_str()) == Some(&0))
            .cloned()
            .collect();
        Self {
            remaining,
            settled: HashMap::new(),
            ready,
            reports: Vec::new(),
        }
    }

    fn settle(&mut self, plan: &ExecutionPlan, report: NodeReport) {
        for next in plan.downstream.get(&report.id).into_iter().flatten() {
            if let Some(count) = self.remaining.get_mut(next) {
                *count -= 1;
                if *count == 0 {
                    self.ready.push_back(next.clone());
                }
            }
        }
        self.settled.insert(report.id.clone(), report.outcome);
        self.reports.push(report);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Canonical string of a node's op and the output ids feeding each handle.
fn fingerprint(graph: &Graph, node: &Node) -> String {
    let mut feeds: Vec<String> = graph
        .incoming(&node.id)
        .map(|e| {
            let ids = graph
                .node(&e.source)
                .map(|n| {
                    n.output_file_ids()
                        .iter()
                        .map(FileId::as_str)
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .unwrap_or_default();
            format!("{}<{}:[{}]", e.target_handle.as_deref().unwrap_or("-"), e.source, ids)
        })
        .collect();
    feeds.sort();
    let op = serde_json::to_string(&node.op).unwrap_or_else(|_| node.kind().to_string());
    format!("{}|{}", op, feeds.join(";"))
}

/// Resolve what arrives on each target handle.
fn gather(
    graph: &Graph,
    node: &Node,
    store: &FileStore,
    settled: &HashMap<String, NodeOutcome>,
) -> Result<Vec<NodeInput>, NodeError> {
    if let NodeOp::Input(cfg) = &node.op {
        let file_id = cfg
            .file_id
            .as_ref()
            .ok_or_else(|| NodeError::MissingInput("no file assigned".into()))?;
        let file = store
            .get(file_id)
            .ok_or_else(|| NodeError::MissingInput(file_id.to_string()))?;
        return Ok(vec![NodeInput {
            handle: None,
            source: node.id.clone(),
            files: vec![file],
        }]);
    }

    let mut inputs = Vec::new();
    for edge in graph.incoming(&node.id) {
        if settled.get(&edge.source) == Some(&NodeOutcome::Failed) {
            return Err(NodeError::MissingInput(edge.source.clone()));
        }
        let ids = graph
            .node(&edge.source)
            .map(Node::output_file_ids)
            .unwrap_or_default();
        if ids.is_empty() {
            return Err(NodeError::MissingInput(edge.source.clone()));
        }
        let files = ids
            .iter()
            .map(|id| store.get(id))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| NodeError::MissingInput(edge.source.clone()))?;
        inputs.push(NodeInput {
            handle: edge.target_handle.clone(),
            source: edge.source.clone(),
            files,
        });
    }
    Ok(inputs)
}

async fn run_transform(
    permits: Arc<Semaphore>,
    renderer: Arc<dyn PageRenderer>,
    (render_scale, preview_scale): (f32, f32),
    op: NodeOp,
    inputs: Vec<NodeInput>,
) -> Result<TransformOutput, NodeError> {
    let _permit = permits
        .acquire_owned()
        .await
        .map_err(|e| NodeError::Internal(format!("worker pool closed: {}", e)))?;
    tokio::task::spawn_blocking(move || {
        let ctx = TransformContext {
            renderer: renderer.as_ref(),
            render_scale,
            preview_scale,
        };
        transform::execute(&op, &inputs, &ctx)
    })
    .await
    .map_err(|e| NodeError::Internal(format!("transform worker panicked: {}", e)))?
}

/// Put the produced artifacts in the store and point the node at them.
fn store_output(
    store: &FileStore,
    out: TransformOutput,
    graph: &mut Graph,
    id: &str,
    fingerprint: String,
) -> Vec<FileId> {
    let preview_id = out.preview.as_ref().map(|p| p.id.clone());
    if let Some(preview) = out.preview {
        store.insert(preview);
    }
    let mut ids = Vec::with_capacity(out.files.len());
    for mut file in out.files {
        ids.push(file.id.clone());
        // Pass-through files already belong to their producer.
        if store.contains(&file.id) {
            continue;
        }
        if file.preview.is_none() && preview_id.as_ref() != Some(&file.id) {
            file.preview = preview_id.clone();
        }
        store.insert(file);
    }
    if let Some(node) = graph.node_mut(id) {
        node.output = NodeOutput::from_ids(ids.clone(), out.many);
        node.status = NodeStatus::Succeeded;
        node.error = None;
        node.generation = Some(fingerprint);
        node.preview = preview_id;
    }
    ids
}

fn record_failure(graph: &mut Graph, id: &str, error: &NodeError) {
    if let Some(node) = graph.node_mut(id) {
        node.status = NodeStatus::Failed;
        node.error = Some(error.clone());
        node.output = NodeOutput::None;
        node.generation = None;
        node.preview = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::render::tests::FlatRenderer;
    use crate::document::testutil::sample_pdf;
    use crate::graph::{Edge, InputConfig, RotateConfig};
    use crate::progress::ExecutionProgressCallback;
    use std::sync::Mutex;

    fn planner() -> Planner {
        Planner::new(
            EngineConfig::builder()
                .renderer(Arc::new(FlatRenderer))
                .concurrency(2)
                .build()
                .unwrap(),
        )
    }

    fn input(g: &mut Graph, store: &FileStore, id: &str, pages: usize) {
        g.add_node(Node::new(id, NodeOp::Input(InputConfig::default()))).unwrap();
        let file_id = store.add(format!("{id}.pdf"), sample_pdf(pages));
        let file = store.get(&file_id).unwrap();
        g.assign_input_file(id, &file).unwrap();
    }

    fn rotate_chain(store: &FileStore) -> SharedGraph {
        let mut g = Graph::new();
        input(&mut g, store, "in", 2);
        g.add_node(Node::new("rot", NodeKind::Rotate.default_op())).unwrap();
        g.add_node(Node::new("out", NodeKind::Output.default_op())).unwrap();
        g.add_edge(Edge::simple("in", "rot")).unwrap();
        g.add_edge(Edge::simple("rot", "out")).unwrap();
        shared(g)
    }

    #[tokio::test]
    async fn chain_runs_in_order_and_commits() {
        let store = FileStore::new();
        let graph = rotate_chain(&store);
        let report = planner().run(&graph, &store).await.unwrap();
        assert!(report.is_clean());
        let ids: Vec<_> = report.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["in", "rot", "out"]);

        let g = graph.read().await;
        let rot = g.node("rot").unwrap();
        assert_eq!(rot.status, NodeStatus::Succeeded);
        assert!(rot.generation.is_some());
        let file = store.get(rot.output_file_id().unwrap()).unwrap();
        assert_eq!(file.name, "rotated.pdf");
    }

    #[tokio::test]
    async fn second_run_reuses_everything() {
        let store = FileStore::new();
        let graph = rotate_chain(&store);
        let p = planner();
        p.run(&graph, &store).await.unwrap();
        let before = store.len();
        let report = p.run(&graph, &store).await.unwrap();
        assert_eq!(report.count(NodeOutcome::Reused), 3);
        assert_eq!(store.len(), before);
    }

    #[tokio::test]
    async fn config_edit_reruns_node_and_dependents_only() {
        let store = FileStore::new();
        let graph = rotate_chain(&store);
        let p = planner();
        p.run(&graph, &store).await.unwrap();
        graph
            .write()
            .await
            .update_config("rot", NodeOp::Rotate(RotateConfig { degrees: 180, pages: None }))
            .unwrap();
        let report = p.run(&graph, &store).await.unwrap();
        assert_eq!(report.outcome("in"), Some(NodeOutcome::Reused));
        assert_eq!(report.outcome("rot"), Some(NodeOutcome::Succeeded));
        assert_eq!(report.outcome("out"), Some(NodeOutcome::Succeeded));
    }

    #[tokio::test]
    async fn failure_propagates_as_missing_input() {
        let store = FileStore::new();
        let mut g = Graph::new();
        input(&mut g, &store, "in", 1);
        g.add_node(Node::new("merge", NodeKind::Merge.default_op())).unwrap();
        g.add_node(Node::new("out", NodeKind::Output.default_op())).unwrap();
        g.add_node(Node::new("rot", NodeKind::Rotate.default_op())).unwrap();
        g.connect("in", "merge").unwrap();
        g.connect("merge", "out").unwrap();
        g.connect("in", "rot").unwrap();
        let graph = shared(g);

        let report = planner().run(&graph, &store).await.unwrap();
        assert_eq!(
            report.node("merge").unwrap().error,
            Some(NodeError::InsufficientInputs { needed: 2, got: 1 })
        );
        assert_eq!(
            report.node("out").unwrap().error,
            Some(NodeError::MissingInput("merge".into()))
        );
        assert_eq!(report.outcome("rot"), Some(NodeOutcome::Succeeded));

        let g = graph.read().await;
        assert_eq!(g.node("merge").unwrap().status, NodeStatus::Failed);
        assert!(g.node("merge").unwrap().output.is_none());
    }

    #[tokio::test]
    async fn input_without_stored_file_fails() {
        let store = FileStore::new();
        let mut g = Graph::new();
        g.add_node(Node::new("in", NodeKind::Input.default_op())).unwrap();
        let graph = shared(g);
        let report = planner().run(&graph, &store).await.unwrap();
        assert!(matches!(
            report.node("in").unwrap().error,
            Some(NodeError::MissingInput(_))
        ));
    }

    #[tokio::test]
    async fn progress_callback_sees_every_node() {
        #[derive(Default)]
        struct Log(Mutex<Vec<String>>);
        impl ExecutionProgressCallback for Log {
            fn on_node_complete(&self, node_id: &str, _outputs: usize) {
                self.0.lock().unwrap().push(node_id.to_string());
            }
        }

        let log = Arc::new(Log::default());
        let p = Planner::new(
            EngineConfig::builder()
                .renderer(Arc::new(FlatRenderer))
                .progress_callback(log.clone())
                .build()
                .unwrap(),
        );
        let store = FileStore::new();
        p.run(&rotate_chain(&store), &store).await.unwrap();
        let mut seen = log.0.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, ["in", "out", "rot"]);
    }

    #[tokio::test]
    async fn nothing_in_flight_after_a_run() {
        let store = FileStore::new();
        let p = planner();
        p.run(&rotate_chain(&store), &store).await.unwrap();
        assert!(!p.is_running("rot"));
        assert!(!p.cancel("rot"));
    }

    #[tokio::test]
    async fn pre_cancelled_work_is_discarded() {
        let store = FileStore::new();
        let graph = rotate_chain(&store);
        let p = planner();
        let token = CancellationToken::new();
        token.cancel();
        let finished = Finished {
            id: "rot".into(),
            kind: NodeKind::Rotate,
            fingerprint: "stale".into(),
            token,
            ticket: u64::MAX,
            started: Instant::now(),
            result: Some(Ok(TransformOutput::default())),
        };
        let report = p.commit(finished, &graph, &store, &NoopProgressCallback).await;
        assert_eq!(report.outcome, NodeOutcome::Discarded);
        assert!(graph.read().await.node("rot").unwrap().output.is_none());
    }

    fn finished_rot(fingerprint: String) -> Finished {
        Finished {
            id: "rot".into(),
            kind: NodeKind::Rotate,
            fingerprint,
            token: CancellationToken::new(),
            ticket: u64::MAX,
            started: Instant::now(),
            result: Some(Ok(TransformOutput::default())),
        }
    }

    #[tokio::test]
    async fn commit_checks_the_generation_it_started_from() {
        let store = FileStore::new();
        let graph = rotate_chain(&store);
        let p = planner();

        let outdated = finished_rot("rotate-before-edit".into());
        let report = p.commit(outdated, &graph, &store, &NoopProgressCallback).await;
        assert_eq!(report.outcome, NodeOutcome::Discarded);

        let current = {
            let g = graph.read().await;
            fingerprint(&g, g.node("rot").unwrap())
        };
        let report = p
            .commit(finished_rot(current.clone()), &graph, &store, &NoopProgressCallback)
            .await;
        assert_eq!(report.outcome, NodeOutcome::Succeeded);
        let g = graph.read().await;
        assert_eq!(g.node("rot").unwrap().generation.as_deref(), Some(current.as_str()));
    }

    #[tokio::test]
    async fn preview_leaves_passed_through_files_untouched() {
        let store = FileStore::new();
        let mut g = Graph::new();
        input(&mut g, &store, "in", 1);
        g.add_node(Node::new("pv", NodeKind::Preview.default_op())).unwrap();
        g.add_edge(Edge::simple("in", "pv")).unwrap();
        let graph = shared(g);

        let report = planner().run(&graph, &store).await.unwrap();
        assert!(report.is_clean());
        let g = graph.read().await;
        let pv = g.node("pv").unwrap();
        assert!(pv.preview.is_some());
        assert_eq!(pv.output_file_ids(), g.node("in").unwrap().output_file_ids());
        let original = store.get(&pv.output_file_ids()[0]).unwrap();
        assert_eq!(original.preview, None);
    }

    #[test]
    fn fingerprint_tracks_config_and_inputs() {
        let store = FileStore::new();
        let mut g = Graph::new();
        input(&mut g, &store, "in", 1);
        g.add_node(Node::new("rot", NodeKind::Rotate.default_op())).unwrap();
        g.add_edge(Edge::simple("in", "rot")).unwrap();

        let before = fingerprint(&g, g.node("rot").unwrap());
        g.node_mut("in").unwrap().output = NodeOutput::Single(FileId::from("x"));
        let rewired = fingerprint(&g, g.node("rot").unwrap());
        assert_ne!(before, rewired);

        g.update_config("rot", NodeOp::Rotate(RotateConfig { degrees: 270, pages: None }))
            .unwrap();
        assert_ne!(rewired, fingerprint(&g, g.node("rot").unwrap()));
    }
}
