//! `pipesink tick`: run one trigger tick against a host snapshot.
//!
//! The fingerprint is persisted under `--state-dir`, so running the command
//! repeatedly behaves like consecutive scheduler ticks: the first run primes,
//! later runs trigger only when upstream builds changed.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::Serialize;
use tracing::info;

use pipesink_core::config::load_trigger_config;
use pipesink_core::error::ErrorCode;
use pipesink_core::store::FileFingerprintStore;
use pipesink_engine::{PipelineSinkTrigger, TickOutcome};

use crate::output::{CliError, OutputMode, render, render_error};
use crate::snapshot::HostSnapshot;

/// Arguments for `pipesink tick`.
#[derive(Args, Debug)]
pub struct TickArgs {
    /// Host snapshot (TOML) to evaluate against.
    #[arg(long)]
    pub host: PathBuf,

    /// Trigger configuration (TOML).
    #[arg(long)]
    pub config: PathBuf,

    /// Directory holding the persisted pipeline fingerprint.
    #[arg(long)]
    pub state_dir: PathBuf,

    /// Name of the job owning the trigger. Defaults to the config file stem.
    #[arg(long)]
    pub owner: Option<String>,

    /// How long to wait for the fingerprint lock, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    pub lock_timeout_ms: u64,
}

#[derive(Debug, Serialize)]
struct TickReport {
    owner: String,
    #[serde(flatten)]
    outcome: TickOutcome,
    scheduled: Vec<String>,
}

/// Execute `pipesink tick`.
pub fn run_tick(args: &TickArgs, verbose: bool, output: OutputMode) -> anyhow::Result<()> {
    let host = HostSnapshot::load(&args.host)?;
    let mut config = match load_trigger_config(&args.config) {
        Ok(config) => config,
        Err(err) => {
            render_error(
                output,
                &CliError::with_code(format!("{err:#}"), ErrorCode::ConfigParseError),
            )?;
            anyhow::bail!("trigger configuration could not be loaded");
        }
    };
    config.verbose |= verbose;

    let owner = args
        .owner
        .clone()
        .unwrap_or_else(|| owner_from_path(&args.config));
    let trigger = PipelineSinkTrigger::new(owner.as_str(), args.state_dir.as_path(), config);
    let store = FileFingerprintStore::with_lock_timeout(Duration::from_millis(args.lock_timeout_ms));

    let outcome = trigger.run(&host, &store);
    info!(owner = %owner, outcome = outcome.kind(), "tick finished");

    if let TickOutcome::Faulted { code, message } = &outcome {
        let mut error = CliError::new(message.as_str());
        error.error_code = Some(code.clone());
        render_error(output, &error)?;
        anyhow::bail!("tick faulted with {code}");
    }

    let report = TickReport {
        owner,
        outcome,
        scheduled: host.scheduled(),
    };
    render(output, &report, render_tick_human)
}

/// Owner name derived from a config path: `jobs/Deploy.toml` → `Deploy`.
pub fn owner_from_path(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |stem| stem.to_string_lossy().into_owned())
}

fn render_tick_human(report: &TickReport, w: &mut dyn Write) -> std::io::Result<()> {
    let kind = report.outcome.kind();
    match &report.outcome {
        TickOutcome::QuietingDown | TickOutcome::Faulted { .. } => writeln!(w, "{kind}"),
        TickOutcome::RootUnavailable { name }
        | TickOutcome::SinkUnavailable { name }
        | TickOutcome::UnresolvedExclusion { name }
        | TickOutcome::SinkBuilding { name } => writeln!(w, "{kind}: {name}"),
        TickOutcome::CycleDetected { cycles } => {
            writeln!(w, "{kind}")?;
            for cycle in cycles {
                writeln!(w, "  cycle: {}", cycle.join(" ⇄ "))?;
            }
            Ok(())
        }
        TickOutcome::PipelineActive { job, activity } => {
            let activity = match activity {
                pipesink_engine::Activity::Building => "building",
                pipesink_engine::Activity::Queued => "queued",
            };
            writeln!(w, "{kind}: {job} is {activity}")
        }
        TickOutcome::PipelineUnstable { unhealthy } => {
            writeln!(w, "{kind}: {}", unhealthy.join(", "))
        }
        TickOutcome::Primed { fingerprint } | TickOutcome::Unchanged { fingerprint } => {
            writeln!(w, "{kind}: {fingerprint}")
        }
        TickOutcome::Triggered {
            fingerprint,
            newly_scheduled,
            ignored_unhealthy,
        } => {
            let sink = report.scheduled.join(", ");
            if *newly_scheduled {
                writeln!(w, "{kind}: {sink} ({fingerprint})")?;
            } else {
                writeln!(w, "{kind}: {sink} already queued ({fingerprint})")?;
            }
            if !ignored_unhealthy.is_empty() {
                writeln!(w, "  ignored unhealthy: {}", ignored_unhealthy.join(", "))?;
            }
            Ok(())
        }
    }
}
