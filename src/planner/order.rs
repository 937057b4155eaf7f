//! Execution order: Kahn's algorithm over the part of the graph that input
//! nodes can reach.

use crate::error::BoardError;
use crate::graph::{Graph, NodeKind};
use std::collections::{HashMap, HashSet, VecDeque};

/// Which nodes run, in which order, and who waits on whom.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExecutionPlan {
    /// A topological order of every reachable node.
    pub order: Vec<String>,
    /// Distinct reachable producers of each node.
    pub upstream: HashMap<String, Vec<String>>,
    /// Distinct reachable consumers of each node.
    pub downstream: HashMap<String, Vec<String>>,
    pub kinds: HashMap<String, NodeKind>,
}

impl ExecutionPlan {
    pub fn build(graph: &Graph) -> Result<Self, BoardError> {
        let reachable = reachable_from_inputs(graph);

        let mut upstream: HashMap<String, Vec<String>> = HashMap::new();
        let mut downstream: HashMap<String, Vec<String>> = HashMap::new();
        for id in &reachable {
            upstream.entry(id.clone()).or_default();
            downstream.entry(id.clone()).or_default();
        }
        for edge in graph.edges() {
            if !(reachable.contains(&edge.source) && reachable.contains(&edge.target)) {
                continue;
            }
            let ups = upstream.entry(edge.target.clone()).or_default();
            if !ups.contains(&edge.source) {
                ups.push(edge.source.clone());
                downstream.entry(edge.source.clone()).or_default().push(edge.target.clone());
            }
        }

        // Seed in graph order so runs are reproducible.
        let mut in_degree: HashMap<&str, usize> = upstream
            .iter()
            .map(|(id, ups)| (id.as_str(), ups.len()))
            .collect();
        let mut ready: VecDeque<&str> = graph
            .nodes()
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();

        let mut order = Vec::with_capacity(reachable.len());
        while let Some(id) = ready.pop_front() {
            order.push(id.to_string());
            for next in downstream.get(id).into_iter().flatten() {
                if let Some(d) = in_degree.get_mut(next.as_str()) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(next.as_str());
                    }
                }
            }
        }

        if order.len() < reachable.len() {
            let stuck = graph
                .nodes()
                .iter()
                .find(|n| in_degree.get(n.id.as_str()).is_some_and(|d| *d > 0))
                .map(|n| n.id.clone())
                .unwrap_or_default();
            let source = upstream
                .get(&stuck)
                .and_then(|ups| ups.first().cloned())
                .unwrap_or_else(|| stuck.clone());
            return Err(BoardError::CycleDetected {
                source_node: source,
                target: stuck,
            });
        }

        let kinds = graph
            .nodes()
            .iter()
            .filter(|n| reachable.contains(&n.id))
            .map(|n| (n.id.clone(), n.kind()))
            .collect();
        Ok(Self {
            order,
            upstream,
            downstream,
            kinds,
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|o| o == id)
    }
}

fn reachable_from_inputs(graph: &Graph) -> HashSet<String> {
    let mut seen = HashSet::new();
    for node in graph.nodes().iter().filter(|n| n.kind() == NodeKind::Input) {
        seen.insert(node.id.clone());
        seen.extend(graph.downstream(&node.id));
    }
    seen
}
