//! Progress-callback trait for per-node execution events.
//!
//! Inject an [`Arc<dyn ExecutionProgressCallback>`] via
//! [`crate::config::EngineConfigBuilder::progress_callback`] to receive
//! events as the planner dispatches and finishes nodes.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: a host can
//! forward events to a progress bar, a UI store or a log sink without the
//! engine knowing how it communicates. For a channel-shaped API use
//! [`crate::stream::run_stream`], which is built on this trait.
//!
//! # Example
//!
//! ```rust
//! use pdfboard::{EngineConfig, ExecutionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     finished: AtomicUsize,
//! }
//!
//! impl ExecutionProgressCallback for CountingCallback {
//!     fn on_node_complete(&self, node_id: &str, outputs: usize) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} produced {} file(s)", node_id, outputs);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { finished: AtomicUsize::new(0) });
//! let config = EngineConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExecutionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the planner as it executes a graph.
///
/// Implementations must be `Send + Sync`: independent nodes run
/// concurrently and their events arrive from different tasks. All methods
/// default to no-ops.
pub trait ExecutionProgressCallback: Send + Sync {
    /// Called once, after ordering, before any node is dispatched.
    ///
    /// # Arguments
    /// * `total_nodes` — nodes reachable from an input node
    fn on_run_start(&self, total_nodes: usize) {
        let _ = total_nodes;
    }

    /// Called when a node's transform is handed to a worker.
    fn on_node_start(&self, node_id: &str, kind: &str) {
        let _ = (node_id, kind);
    }

    /// Called when a node's result is committed, or reused from a previous run.
    ///
    /// # Arguments
    /// * `outputs` — number of files the node now exposes
    fn on_node_complete(&self, node_id: &str, outputs: usize) {
        let _ = (node_id, outputs);
    }

    /// Called when a node fails. Dependents will fail with a missing input.
    fn on_node_error(&self, node_id: &str, error: &str) {
        let _ = (node_id, error);
    }

    /// Called once after every reachable node has settled.
    ///
    /// # Arguments
    /// * `total_nodes`   — same value as passed to `on_run_start`
    /// * `success_count` — nodes that succeeded or were reused
    fn on_run_complete(&self, total_nodes: usize, success_count: usize) {
        let _ = (total_nodes, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ExecutionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::EngineConfig`].
pub type ProgressCallback = Arc<dyn ExecutionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        run_total: AtomicUsize,
        succeeded: AtomicUsize,
    }

    impl ExecutionProgressCallback for TrackingCallback {
        fn on_run_start(&self, total_nodes: usize) {
            self.run_total.store(total_nodes, Ordering::SeqCst);
        }

        fn on_node_start(&self, _node_id: &str, _kind: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_node_complete(&self, _node_id: &str, _outputs: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_node_error(&self, _node_id: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_run_complete(&self, _total_nodes: usize, success_count: usize) {
            self.succeeded.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_node_start("in", "input");
        cb.on_node_complete("in", 1);
        cb.on_node_error("rot", "Format error");
        cb.on_run_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_run_start(3);
        tracker.on_node_start("in", "input");
        tracker.on_node_complete("in", 1);
        tracker.on_node_start("merge", "merge");
        tracker.on_node_error("merge", "Needs at least 2 input files, got 1");
        tracker.on_run_complete(3, 1);

        assert_eq!(tracker.run_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.succeeded.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_node_start("a", "rotate");
        cb.on_node_complete("a", 1);
    }
}
