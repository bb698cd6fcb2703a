//! `pipesink rename` / `pipesink delete`: keep trigger configs consistent
//! after a job was renamed or deleted on the host.
//!
//! Every `--config` file is one trigger owner. The change is fanned out over
//! all of them; only configs that actually changed are rewritten.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use pipesink_core::config::{load_trigger_config, save_trigger_config};
use pipesink_core::error::ErrorCode;
use pipesink_engine::{
    FanoutReport, PipelineSinkTrigger, TriggerRegistry, propagate_delete, propagate_rename,
};

use crate::cmd::tick::owner_from_path;
use crate::output::{CliError, OutputMode, render, render_error};

/// Arguments for `pipesink rename`.
#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Trigger configuration files to update (repeatable).
    #[arg(long = "config", required = true)]
    pub configs: Vec<PathBuf>,

    /// Previous job name.
    pub old_name: String,

    /// New job name.
    pub new_name: String,
}

/// Arguments for `pipesink delete`.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Trigger configuration files to update (repeatable).
    #[arg(long = "config", required = true)]
    pub configs: Vec<PathBuf>,

    /// Name of the deleted job.
    pub name: String,
}

/// Trigger configs on disk, one owner per file.
struct ConfigFiles {
    entries: Vec<(Arc<PipelineSinkTrigger>, PathBuf)>,
}

impl ConfigFiles {
    fn load(paths: &[PathBuf]) -> Result<Self> {
        let entries = paths
            .iter()
            .map(|path| {
                let config = load_trigger_config(path)?;
                let owner_dir = path.parent().map(PathBuf::from).unwrap_or_default();
                let trigger = PipelineSinkTrigger::new(owner_from_path(path), owner_dir, config);
                Ok((Arc::new(trigger), path.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }
}

impl TriggerRegistry for ConfigFiles {
    fn triggers(&self) -> Vec<Arc<PipelineSinkTrigger>> {
        self.entries.iter().map(|(trigger, _)| Arc::clone(trigger)).collect()
    }

    fn save(&self, trigger: &PipelineSinkTrigger) -> Result<()> {
        let path = self
            .entries
            .iter()
            .find(|(candidate, _)| std::ptr::eq(Arc::as_ptr(candidate), trigger))
            .map(|(_, path)| path)
            .with_context(|| format!("no config file for owner '{}'", trigger.owner()))?;
        save_trigger_config(path, &trigger.config())
    }
}

/// Execute `pipesink rename`.
pub fn run_rename(args: &RenameArgs, output: OutputMode) -> Result<()> {
    let registry = load_registry(&args.configs, output)?;
    let report = propagate_rename(&registry, &args.old_name, &args.new_name);
    finish(&report, output)
}

/// Execute `pipesink delete`.
pub fn run_delete(args: &DeleteArgs, output: OutputMode) -> Result<()> {
    let registry = load_registry(&args.configs, output)?;
    let report = propagate_delete(&registry, &args.name);
    finish(&report, output)
}

fn load_registry(paths: &[PathBuf], output: OutputMode) -> Result<ConfigFiles> {
    match ConfigFiles::load(paths) {
        Ok(registry) => Ok(registry),
        Err(err) => {
            render_error(
                output,
                &CliError::with_code(format!("{err:#}"), ErrorCode::ConfigParseError),
            )?;
            anyhow::bail!("trigger configuration could not be loaded");
        }
    }
}

fn finish(report: &FanoutReport, output: OutputMode) -> Result<()> {
    render(output, report, render_maintain_human)?;

    if !report.is_clean() {
        render_error(
            output,
            &CliError::with_code(
                format!("failed to save: {}", report.failed.join(", ")),
                ErrorCode::ConfigWriteFailed,
            ),
        )?;
        anyhow::bail!("{} trigger config(s) could not be saved", report.failed.len());
    }
    Ok(())
}

fn render_maintain_human(report: &FanoutReport, w: &mut dyn Write) -> std::io::Result<()> {
    if report.saved.is_empty() && report.failed.is_empty() {
        return writeln!(w, "No trigger configs changed.");
    }
    for owner in &report.saved {
        writeln!(w, "updated {owner}")?;
    }
    for owner in &report.failed {
        writeln!(w, "failed  {owner}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pipesink_core::config::TriggerConfig;

    use super::*;

    fn write_config(dir: &std::path::Path, file: &str, config: &TriggerConfig) -> PathBuf {
        let path = dir.join(file);
        save_trigger_config(&path, config).expect("save");
        path
    }

    #[test]
    fn rename_rewrites_only_changed_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = write_config(dir.path(), "A.toml", &TriggerConfig::new("Root", "Sink", "X, Y"));
        let b = write_config(dir.path(), "B.toml", &TriggerConfig::new("Other", "Sink2", ""));
        let b_before = fs::read_to_string(&b).expect("read");

        let registry = ConfigFiles::load(&[a.clone(), b.clone()]).expect("load");
        let report = propagate_rename(&registry, "X", "X2");

        assert_eq!(report.saved, vec!["A".to_string()]);
        let reloaded = load_trigger_config(&a).expect("reload");
        assert_eq!(reloaded.excluded_project_names, "X2,Y");
        assert_eq!(fs::read_to_string(&b).expect("read"), b_before);
    }

    #[test]
    fn delete_persists_shrunk_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = write_config(dir.path(), "A.toml", &TriggerConfig::new("Root", "Sink", "X"));

        let registry = ConfigFiles::load(&[a.clone()]).expect("load");
        let report = propagate_delete(&registry, "X");

        assert!(report.is_clean());
        assert_eq!(load_trigger_config(&a).expect("reload").excluded_project_names, "");
    }

    #[test]
    fn human_summary_lists_owners() {
        let report = FanoutReport {
            saved: vec!["A".to_string()],
            failed: vec!["B".to_string()],
        };
        let mut out = Vec::new();
        render_maintain_human(&report, &mut out).expect("render");
        assert_eq!(String::from_utf8(out).expect("utf8"), "updated A\nfailed  B\n");
    }
}
