//! Cycle detection over a discovered pipeline graph.
//!
//! A pipeline is expected to be acyclic but host configuration can make two
//! jobs trigger each other. The trigger refuses to evaluate such a pipeline:
//! a cycle is a normal reject for the tick, not an error.

#![allow(clippy::module_name_repetitions)]

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};

use pipesink_core::model::Job;

use super::build::PipelineGraph;

/// `true` if the pipeline graph contains at least one cycle.
///
/// O(V+E), one depth-first pass looking for a back edge. Self-loops count.
#[must_use]
pub fn has_cycle(pipeline: &PipelineGraph) -> bool {
    is_cyclic_directed(&pipeline.graph)
}

/// Find all cycles currently present in the pipeline.
///
/// Each entry is a sorted list of job names in one strongly connected
/// component (SCC). Self-loops are reported as a one-element cycle.
#[must_use]
pub fn find_cycles(pipeline: &PipelineGraph) -> Vec<Vec<String>> {
    let graph = &pipeline.graph;
    let mut cycles: Vec<Vec<String>> = tarjan_scc(graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || component.first().is_some_and(|node| has_self_loop(graph, *node))
        })
        .map(|component| {
            let mut names: Vec<String> = component
                .into_iter()
                .map(|idx| graph[idx].name.clone())
                .collect();
            names.sort_unstable();
            names
        })
        .collect();

    cycles.sort_unstable();
    cycles
}

fn has_self_loop(graph: &DiGraph<Job, ()>, node: NodeIndex) -> bool {
    graph.find_edge(node, node).is_some()
}
