//! The pipeline sink trigger.
//!
//! # Overview
//!
//! On every scheduler tick the trigger decides whether its sink job should
//! be built. The sink is built if and only if the pipeline rooted at the
//! configured root job is:
//!
//! - **inactive**: no job in it is building or queued,
//! - **stable**: no job's last build is worse than unstable (the
//!   `ignoreNonSuccessfulUpstreamDependencyBuilds` option relaxes this),
//! - **stale**: the pipeline fingerprint differs from the one persisted when
//!   the sink was last triggered.
//!
//! # Stages
//!
//! ```text
//! root missing/disabled ─────────────► RootUnavailable
//! sink missing/disabled ─────────────► SinkUnavailable
//! exclusion does not resolve ────────► UnresolvedExclusion
//! sink building ─────────────────────► SinkBuilding
//! build graph, cycle found ──────────► CycleDetected
//! evaluate: building/queued ─────────► PipelineActive
//!           unhealthy, not ignored ──► PipelineUnstable
//! fingerprint: no baseline ──────────► Primed     (persist)
//!              unchanged ────────────► Unchanged
//!              changed ──────────────► Triggered  (persist, schedule sink)
//! ```
//!
//! Evaluation stops at the first rejecting stage. Any host or store fault is
//! logged and turned into [`TickOutcome::Faulted`]; nothing propagates to the
//! scheduler.
//!
//! # Locking
//!
//! The configuration mutex is held for the whole tick, so rename/delete
//! notifications wait for a running tick and a tick never sees a
//! half-updated name set. It also keeps two ticks of the same trigger from
//! overlapping.

#![allow(clippy::module_name_repetitions)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use pipesink_core::config::TriggerConfig;
use pipesink_core::error::ErrorCode;
use pipesink_core::host::JobRepository;
use pipesink_core::model::{Job, TriggerCause};
use pipesink_core::store::{FingerprintStore, StoreError};

use crate::evaluate::{Activity, Evaluation, evaluate};
use crate::fingerprint::{ChangeOutcome, Fingerprint};
use crate::graph::{PipelineGraph, find_cycles, has_cycle};

const MARKER: &str = "====================================================================================================";

// ---------------------------------------------------------------------------
// TickOutcome
// ---------------------------------------------------------------------------

/// Terminal outcome of one tick. Only [`TickOutcome::Triggered`] requests a
/// build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// The host is quieting down; nothing was evaluated.
    QuietingDown,
    RootUnavailable { name: String },
    SinkUnavailable { name: String },
    UnresolvedExclusion { name: String },
    SinkBuilding { name: String },
    CycleDetected { cycles: Vec<Vec<String>> },
    PipelineActive { job: String, activity: Activity },
    PipelineUnstable { unhealthy: Vec<String> },
    /// First evaluation: the baseline fingerprint was persisted.
    Primed { fingerprint: Fingerprint },
    Unchanged { fingerprint: Fingerprint },
    Triggered {
        fingerprint: Fingerprint,
        /// `false` when a sink build was already waiting in the queue.
        newly_scheduled: bool,
        /// Unhealthy jobs let through by the override option.
        ignored_unhealthy: Vec<String>,
    },
    /// A host or store fault aborted the tick.
    Faulted { code: String, message: String },
}

impl TickOutcome {
    /// `true` if this tick requested a sink build.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        matches!(self, Self::Triggered { .. })
    }

    /// Short machine-friendly name of the outcome.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::QuietingDown => "quieting_down",
            Self::RootUnavailable { .. } => "root_unavailable",
            Self::SinkUnavailable { .. } => "sink_unavailable",
            Self::UnresolvedExclusion { .. } => "unresolved_exclusion",
            Self::SinkBuilding { .. } => "sink_building",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::PipelineActive { .. } => "pipeline_active",
            Self::PipelineUnstable { .. } => "pipeline_unstable",
            Self::Primed { .. } => "primed",
            Self::Unchanged { .. } => "unchanged",
            Self::Triggered { .. } => "triggered",
            Self::Faulted { .. } => "faulted",
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineSinkTrigger
// ---------------------------------------------------------------------------

/// A trigger instance owned by one job.
#[derive(Debug)]
pub struct PipelineSinkTrigger {
    owner: String,
    owner_dir: PathBuf,
    config: Mutex<TriggerConfig>,
}

impl PipelineSinkTrigger {
    /// Create a trigger owned by `owner`, persisting its fingerprint under
    /// `owner_dir`.
    #[must_use]
    pub fn new(owner: impl Into<String>, owner_dir: impl Into<PathBuf>, config: TriggerConfig) -> Self {
        Self {
            owner: owner.into(),
            owner_dir: owner_dir.into(),
            config: Mutex::new(config),
        }
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn owner_dir(&self) -> &Path {
        &self.owner_dir
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> TriggerConfig {
        self.lock_config().clone()
    }

    fn lock_config(&self) -> MutexGuard<'_, TriggerConfig> {
        // A panicking tick leaves the config itself intact.
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Follow a job rename. Returns `true` if the owner must be saved.
    pub fn on_job_renamed(&self, old_name: &str, new_name: &str) -> bool {
        self.lock_config().on_job_renamed(old_name, new_name)
    }

    /// Follow a job deletion. Returns `true` if the owner must be saved.
    pub fn on_job_deleted(&self, name: &str) -> bool {
        self.lock_config().on_job_deleted(name)
    }

    /// Scheduler entry point: skips the tick while the host quiets down,
    /// otherwise runs [`Self::decide`].
    pub fn run<R, S>(&self, repo: &R, store: &S) -> TickOutcome
    where
        R: JobRepository + ?Sized,
        S: FingerprintStore + ?Sized,
    {
        match repo.is_quieting_down() {
            Ok(true) => {
                debug!(owner = %self.owner, "host is quieting down, skipping tick");
                TickOutcome::QuietingDown
            }
            Ok(false) => self.decide(repo, store),
            Err(err) => self.fault(&err.context("query quiet-down state")),
        }
    }

    /// Decide whether the sink should be built on this tick and, if so,
    /// request the build.
    ///
    /// Never fails: faults are logged and reported as
    /// [`TickOutcome::Faulted`].
    #[instrument(skip_all, fields(owner = %self.owner))]
    pub fn decide<R, S>(&self, repo: &R, store: &S) -> TickOutcome
    where
        R: JobRepository + ?Sized,
        S: FingerprintStore + ?Sized,
    {
        let config = self.lock_config();

        info!("{MARKER}");
        info!(
            "deciding if a build of '{}' should be triggered by '{}'",
            config.sink_project_name, self.owner
        );

        let outcome = match self.evaluate_tick(repo, store, &config) {
            Ok(outcome) => outcome,
            Err(err) => self.fault(&err),
        };
        drop(config);

        info!("{MARKER}");
        outcome
    }

    fn fault(&self, err: &anyhow::Error) -> TickOutcome {
        let code = fault_code(err);
        error!(
            owner = %self.owner,
            code = %code,
            "{} during trigger execution: {err:#}",
            code.message()
        );
        TickOutcome::Faulted {
            code: code.code().to_string(),
            message: format!("{err:#}"),
        }
    }

    fn evaluate_tick<R, S>(&self, repo: &R, store: &S, config: &TriggerConfig) -> Result<TickOutcome>
    where
        R: JobRepository + ?Sized,
        S: FingerprintStore + ?Sized,
    {
        let root_name = &config.root_project_name;
        let Some(root) = resolve(repo, root_name)? else {
            info!("root project '{root_name}' does not exist");
            return Ok(TickOutcome::RootUnavailable { name: root_name.clone() });
        };
        if root.disabled {
            info!("root project '{root_name}' is disabled");
            return Ok(TickOutcome::RootUnavailable { name: root_name.clone() });
        }

        let sink_name = &config.sink_project_name;
        let Some(sink) = resolve(repo, sink_name)? else {
            info!("sink project '{sink_name}' does not exist");
            return Ok(TickOutcome::SinkUnavailable { name: sink_name.clone() });
        };
        if sink.disabled {
            info!("sink project '{sink_name}' is disabled");
            return Ok(TickOutcome::SinkUnavailable { name: sink_name.clone() });
        }

        let mut exclusions: HashSet<String> = HashSet::new();
        for name in config.exclusions() {
            let Some(job) = resolve(repo, &name)? else {
                info!("excluded project '{name}' does not exist");
                return Ok(TickOutcome::UnresolvedExclusion { name });
            };
            exclusions.insert(job.name);
        }

        if repo
            .is_building(&sink)
            .with_context(|| format!("query building state of '{sink_name}'"))?
        {
            info!("skipping trigger since sink project '{sink_name}' is building");
            return Ok(TickOutcome::SinkBuilding { name: sink_name.clone() });
        }

        let graph = PipelineGraph::build(repo, &root, &exclusions)?;
        if config.verbose {
            info!(
                "the build pipeline graph rooted at '{}':\n{}",
                root.name,
                graph.adjacency_listing()
            );
        }

        if has_cycle(&graph) {
            let cycles = find_cycles(&graph);
            info!(?cycles, "pipeline graph of '{sink_name}' contains cycles");
            return Ok(TickOutcome::CycleDetected { cycles });
        }

        let health = match evaluate(repo, &graph)? {
            Evaluation::Active { job, activity } => {
                info!(%job, ?activity, "pipeline of '{sink_name}' is active");
                return Ok(TickOutcome::PipelineActive { job, activity });
            }
            Evaluation::Settled(health) => health,
        };

        if !health.is_stable() {
            let listed = health.unhealthy.join(", ");
            if !config.ignore_non_successful_upstream_dependency_builds {
                info!("pipeline of '{sink_name}' has non-successful upstream dependency builds: {listed}");
                return Ok(TickOutcome::PipelineUnstable {
                    unhealthy: health.unhealthy,
                });
            }
            info!("ignoring non-successful upstream dependency builds: {listed}");
        }

        let current = Fingerprint::compute(&health.fingerprint_inputs);
        let previous = store
            .read(&self.owner_dir)
            .context("read persisted pipeline fingerprint")?
            .map(Fingerprint::from_persisted);

        match current.compare(previous.as_ref()) {
            ChangeOutcome::NoBaseline => {
                self.persist(store, &current)?;
                info!("no previous fingerprint to compare against for '{sink_name}'; baseline recorded");
                Ok(TickOutcome::Primed { fingerprint: current })
            }
            ChangeOutcome::Unchanged => {
                info!("no upstream dependency build changes for '{sink_name}'");
                Ok(TickOutcome::Unchanged { fingerprint: current })
            }
            ChangeOutcome::Changed => {
                self.persist(store, &current)?;
                info!("detected upstream dependency build changes for '{sink_name}'");
                let newly_scheduled = repo
                    .schedule_build(&sink, &TriggerCause::new(&self.owner))
                    .with_context(|| format!("schedule build of '{sink_name}'"))?;
                if newly_scheduled {
                    info!("triggering '{sink_name}'");
                } else {
                    info!("'{sink_name}' is already in the queue");
                }
                Ok(TickOutcome::Triggered {
                    fingerprint: current,
                    newly_scheduled,
                    ignored_unhealthy: health.unhealthy,
                })
            }
        }
    }

    fn persist<S>(&self, store: &S, fingerprint: &Fingerprint) -> Result<()>
    where
        S: FingerprintStore + ?Sized,
    {
        store
            .write(&self.owner_dir, fingerprint.as_str())
            .context("persist pipeline fingerprint")?;
        Ok(())
    }
}

fn resolve<R>(repo: &R, name: &str) -> Result<Option<Job>>
where
    R: JobRepository + ?Sized,
{
    repo.find_by_name(name)
        .with_context(|| format!("look up project '{name}'"))
}

/// Store faults carry their own code; anything else came from the host.
fn fault_code(err: &anyhow::Error) -> ErrorCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StoreError>())
        .map_or(ErrorCode::HostQueryFailed, StoreError::code)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
