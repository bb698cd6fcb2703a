//! `pipesink graph`: show the pipeline a trigger would evaluate.
//!
//! Builds the pipeline graph rooted at the configured root job, with the
//! configured exclusions applied, and reports its adjacency listing and any
//! cycles. Nothing is persisted or scheduled.

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tracing::warn;

use pipesink_core::config::load_trigger_config;
use pipesink_core::host::JobRepository;
use pipesink_engine::{PipelineGraph, find_cycles};

use crate::output::{CliError, OutputMode, render, render_error};
use crate::snapshot::HostSnapshot;

/// Arguments for `pipesink graph`.
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Host snapshot (TOML) to read jobs from.
    #[arg(long)]
    pub host: PathBuf,

    /// Trigger configuration (TOML) naming the root and exclusions.
    #[arg(long)]
    pub config: PathBuf,
}

#[derive(Debug, Serialize)]
struct GraphReport {
    root: String,
    nodes: usize,
    edges: usize,
    adjacency: Vec<AdjacencyEntry>,
    cycles: Vec<Vec<String>>,
    unresolved_exclusions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AdjacencyEntry {
    job: String,
    downstream: Vec<String>,
}

/// Execute `pipesink graph`.
pub fn run_graph(args: &GraphArgs, output: OutputMode) -> anyhow::Result<()> {
    let host = HostSnapshot::load(&args.host)?;
    let config = load_trigger_config(&args.config)?;

    let Some(root) = host.find_by_name(&config.root_project_name)? else {
        render_error(
            output,
            &CliError::new(format!(
                "root project '{}' is not in the host snapshot",
                config.root_project_name
            )),
        )?;
        anyhow::bail!("root project not found");
    };

    let mut exclusions = HashSet::new();
    let mut unresolved = Vec::new();
    for name in config.exclusions() {
        match host.find_by_name(&name)? {
            Some(job) => {
                exclusions.insert(job.name);
            }
            None => {
                warn!("excluded project '{name}' does not exist");
                unresolved.push(name);
            }
        }
    }

    let graph = PipelineGraph::build(&host, &root, &exclusions)
        .context("failed to build pipeline graph")?;
    let report = report_for(&graph, unresolved);
    render(output, &report, render_graph_human)
}

fn report_for(graph: &PipelineGraph, unresolved_exclusions: Vec<String>) -> GraphReport {
    let adjacency = graph
        .graph
        .node_indices()
        .map(|idx| AdjacencyEntry {
            job: graph.graph[idx].name.clone(),
            downstream: graph.children(idx).into_iter().map(ToString::to_string).collect(),
        })
        .collect();

    GraphReport {
        root: graph.root_job().name.clone(),
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        adjacency,
        cycles: find_cycles(graph),
        unresolved_exclusions,
    }
}

fn render_graph_human(report: &GraphReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "Pipeline of {} ({} jobs, {} edges)",
        report.root, report.nodes, report.edges
    )?;
    for entry in &report.adjacency {
        writeln!(w, "{}: {{{}}}", entry.job, entry.downstream.join(", "))?;
    }

    if report.cycles.is_empty() {
        writeln!(w, "No cycles.")?;
    } else {
        writeln!(w, "Cycles ({})", report.cycles.len())?;
        for cycle in &report.cycles {
            writeln!(w, "  - {}", cycle.join(", "))?;
        }
    }

    if !report.unresolved_exclusions.is_empty() {
        writeln!(
            w,
            "Unresolved exclusions: {}",
            report.unresolved_exclusions.join(", ")
        )?;
    }
    Ok(())
}
