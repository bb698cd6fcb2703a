//! Pipeline graph discovery.
//!
//! # Overview
//!
//! Starting at the configured root job, the builder asks the host for each
//! job's downstream jobs and materializes the result as a [`petgraph`]
//! directed graph. An edge `A → B` means "B is downstream of A": a build of
//! A triggers B.
//!
//! ## Filtering
//!
//! Disabled downstream jobs and jobs named in the exclusion set are skipped
//! together with everything only reachable through them. The root itself is
//! never filtered here; the trigger checks it before building.
//!
//! ## Walk
//!
//! An iterative depth-first walk with an explicit stack, so arbitrarily deep
//! pipelines cannot overflow the call stack. A child is pushed whenever the
//! edge leading to it is new, even if the child was discovered before. That
//! way every edge, including one that closes a loop, ends up in the graph
//! and [`super::cycles`] can see it. Since each edge is added once the walk
//! terminates on cyclic input too.

#![allow(clippy::module_name_repetitions)]

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, instrument};

use pipesink_core::host::JobRepository;
use pipesink_core::model::Job;

// ---------------------------------------------------------------------------
// PipelineGraph
// ---------------------------------------------------------------------------

/// The pipeline rooted at one job, as discovered on this tick.
///
/// Built fresh for every evaluation and never mutated afterwards.
#[derive(Debug)]
pub struct PipelineGraph {
    /// Directed graph: nodes = jobs, edges = upstream → downstream.
    pub graph: DiGraph<Job, ()>,
    /// Mapping from job name to petgraph `NodeIndex`.
    pub node_map: HashMap<String, NodeIndex>,
    /// Index of the root job.
    pub root: NodeIndex,
}

impl PipelineGraph {
    /// Discover the pipeline rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host fails to list the downstream jobs of any
    /// visited job.
    #[instrument(skip(repo, root, exclusions), fields(root = %root.name))]
    pub fn build<R>(repo: &R, root: &Job, exclusions: &HashSet<String>) -> Result<Self>
    where
        R: JobRepository + ?Sized,
    {
        let mut graph = DiGraph::<Job, ()>::new();
        let mut node_map: HashMap<String, NodeIndex> = HashMap::new();

        let root_idx = graph.add_node(root.clone());
        node_map.insert(root.name.clone(), root_idx);

        let mut stack: Vec<NodeIndex> = vec![root_idx];
        while let Some(parent_idx) = stack.pop() {
            let parent = graph[parent_idx].clone();
            let children = repo
                .downstream_of(&parent)
                .with_context(|| format!("list downstream jobs of '{}'", parent.name))?;

            for child in children {
                if child.disabled || exclusions.contains(&child.name) {
                    debug!(parent = %parent.name, child = %child.name, "skipping filtered downstream job");
                    continue;
                }

                let child_idx = *node_map
                    .entry(child.name.clone())
                    .or_insert_with(|| graph.add_node(child));

                // Already captured; re-expanding would add nothing new.
                if graph.contains_edge(parent_idx, child_idx) {
                    continue;
                }
                graph.add_edge(parent_idx, child_idx, ());
                stack.push(child_idx);
            }
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "pipeline graph built"
        );

        Ok(Self {
            graph,
            node_map,
            root: root_idx,
        })
    }

    /// Return the number of jobs in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Return the number of upstream → downstream edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up the `NodeIndex` for a job name.
    #[must_use]
    pub fn node_index(&self, name: &str) -> Option<NodeIndex> {
        self.node_map.get(name).copied()
    }

    /// Return the job stored at `idx`.
    #[must_use]
    pub fn job(&self, idx: NodeIndex) -> Option<&Job> {
        self.graph.node_weight(idx)
    }

    /// The root job.
    #[must_use]
    pub fn root_job(&self) -> &Job {
        &self.graph[self.root]
    }

    /// `true` if the edge `from → to` (by job name) is present.
    #[must_use]
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        match (self.node_index(from), self.node_index(to)) {
            (Some(a), Some(b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    /// Downstream job names of `idx`, in the order the edges were added.
    #[must_use]
    pub fn children(&self, idx: NodeIndex) -> Vec<&str> {
        // petgraph yields the most recently added edge first.
        let mut names: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].name.as_str())
            .collect();
        names.reverse();
        names
    }

    /// Human-readable adjacency listing, one line per job in discovery
    /// order: `name: {child, child}`.
    #[must_use]
    pub fn adjacency_listing(&self) -> String {
        self.graph
            .node_indices()
            .map(|idx| {
                format!(
                    "{}: {{{}}}\n",
                    self.graph[idx].name,
                    self.children(idx).join(", ")
                )
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
