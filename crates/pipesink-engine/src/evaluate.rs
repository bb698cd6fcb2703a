//! Activity and health evaluation over a verified-acyclic pipeline.
//!
//! Every job reachable from the root is visited exactly once, depth-first.
//! For each job, in priority order:
//!
//! 1. Building or queued: the whole pipeline is active and the walk stops.
//! 2. Last build worse than unstable: the job is recorded as unhealthy.
//! 3. Always: `"{full_name}({last_build_id})"` is recorded as a fingerprint
//!    input (empty id when the job was never built).
//!
//! Visiting order only affects the order of the fingerprint inputs, which
//! [`crate::fingerprint::Fingerprint::compute`] sorts anyway.

use anyhow::{Context, Result};
use petgraph::visit::Dfs;
use serde::Serialize;
use tracing::{debug, trace};

use pipesink_core::host::JobRepository;
use pipesink_core::model::{BuildRecord, Job};

use crate::graph::PipelineGraph;

/// Result of walking the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// A job is building or queued; nothing else was inspected.
    Active { job: String, activity: Activity },
    /// Nothing is running; health and fingerprint inputs were collected.
    Settled(PipelineHealth),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Building,
    Queued,
}

/// Health of an inactive pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineHealth {
    /// Jobs whose last build is worse than unstable, in visiting order.
    pub unhealthy: Vec<String>,
    /// One `"{full_name}({last_build_id})"` entry per visited job.
    pub fingerprint_inputs: Vec<String>,
}

impl PipelineHealth {
    /// `true` when no visited job has an unhealthy last build.
    #[must_use]
    pub fn is_stable(&self) -> bool {
        self.unhealthy.is_empty()
    }
}

/// Walk the pipeline from its root.
///
/// # Errors
///
/// Returns an error if any host query fails; the partial result is dropped.
pub fn evaluate<R>(repo: &R, pipeline: &PipelineGraph) -> Result<Evaluation>
where
    R: JobRepository + ?Sized,
{
    let graph = &pipeline.graph;
    let mut health = PipelineHealth::default();
    let mut dfs = Dfs::new(graph, pipeline.root);

    while let Some(idx) = dfs.next(graph) {
        let job = &graph[idx];

        if let Some(activity) = activity_of(repo, job)? {
            debug!(job = %job.name, ?activity, "pipeline is active");
            return Ok(Evaluation::Active {
                job: job.name.clone(),
                activity,
            });
        }

        let last_build = repo
            .last_build(job)
            .with_context(|| format!("query last build of '{}'", job.name))?;

        if let Some(build) = last_build.as_ref().filter(|b| b.result.is_unhealthy()) {
            debug!(job = %job.name, result = %build.result, "unhealthy upstream build");
            health.unhealthy.push(job.name.clone());
        }

        let input = fingerprint_input(job, last_build.as_ref());
        trace!(%input, "fingerprint input");
        health.fingerprint_inputs.push(input);
    }

    Ok(Evaluation::Settled(health))
}

fn activity_of<R>(repo: &R, job: &Job) -> Result<Option<Activity>>
where
    R: JobRepository + ?Sized,
{
    if repo
        .is_building(job)
        .with_context(|| format!("query building state of '{}'", job.name))?
    {
        return Ok(Some(Activity::Building));
    }
    if repo
        .is_queued(job)
        .with_context(|| format!("query queue state of '{}'", job.name))?
    {
        return Ok(Some(Activity::Queued));
    }
    Ok(None)
}

/// The per-job entry hashed into the pipeline fingerprint.
///
/// Uses the full name, so renaming a job changes the fingerprint.
#[must_use]
pub fn fingerprint_input(job: &Job, last_build: Option<&BuildRecord>) -> String {
    format!(
        "{}({})",
        job.full_name,
        last_build.map_or("", |b| b.id.as_str())
    )
}
