//! Trigger configuration and identifier maintenance.
//!
//! A [`TriggerConfig`] names three kinds of jobs: the pipeline root, the sink
//! to build, and a comma-delimited list of excluded jobs. When the host
//! renames or deletes a job those names have to follow, otherwise the next
//! tick rejects on an unresolvable name. [`TriggerConfig::on_job_renamed`]
//! and [`TriggerConfig::on_job_deleted`] keep them consistent and report
//! whether the owning job must be saved.
//!
//! # Exclusion list normalization
//!
//! The raw exclusion string is kept exactly as configured until a rename or
//! delete actually touches it. At that point it is rewritten in canonical
//! form: tokens trimmed, blank tokens dropped, duplicates removed keeping the
//! first occurrence, joined with `,` and no padding.
//!
//! Ticks read the list through [`split_exclusions`], which skips blank
//! tokens, so the empty entry in `" , Job-1"` is never looked up and never
//! treated as an unresolvable job name.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-trigger configuration, as stored with the owning job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    /// Schedule expression, evaluated by the host scheduler.
    #[serde(default)]
    pub spec: String,
    pub root_project_name: String,
    pub sink_project_name: String,
    #[serde(default)]
    pub excluded_project_names: String,
    #[serde(default)]
    pub ignore_non_successful_upstream_dependency_builds: bool,
    #[serde(default)]
    pub verbose: bool,
}

impl TriggerConfig {
    #[must_use]
    pub fn new(
        root_project_name: impl Into<String>,
        sink_project_name: impl Into<String>,
        excluded_project_names: impl Into<String>,
    ) -> Self {
        Self {
            spec: String::new(),
            root_project_name: root_project_name.into(),
            sink_project_name: sink_project_name.into(),
            excluded_project_names: excluded_project_names.into(),
            ignore_non_successful_upstream_dependency_builds: false,
            verbose: false,
        }
    }

    /// Trimmed, non-blank exclusion tokens in configured order.
    #[must_use]
    pub fn exclusions(&self) -> Vec<String> {
        split_exclusions(&self.excluded_project_names)
    }

    /// Follow a job rename.
    ///
    /// Root and sink names are replaced on exact match; every exclusion token
    /// equal to `old_name` is replaced in place. Returns `true` iff any field
    /// changed, in which case the caller must persist the owning job.
    pub fn on_job_renamed(&mut self, old_name: &str, new_name: &str) -> bool {
        if old_name == new_name {
            return false;
        }

        let mut changed = false;

        let mut tokens = split_exclusions(&self.excluded_project_names);
        let mut excluded_changed = false;
        for token in &mut tokens {
            if token == old_name {
                new_name.clone_into(token);
                excluded_changed = true;
            }
        }
        if excluded_changed {
            self.excluded_project_names = join_exclusions(tokens);
            changed = true;
        }

        if self.root_project_name == old_name {
            self.root_project_name = new_name.to_string();
            changed = true;
        }
        if self.sink_project_name == old_name {
            self.sink_project_name = new_name.to_string();
            changed = true;
        }

        changed
    }

    /// Follow a job deletion.
    ///
    /// Only the exclusion list is affected: every token equal to `name` is
    /// dropped. Deleting the root or sink job is left to the host. Returns
    /// `true` iff the exclusion list changed.
    pub fn on_job_deleted(&mut self, name: &str) -> bool {
        let tokens = split_exclusions(&self.excluded_project_names);
        let before = tokens.len();
        let kept: Vec<String> = tokens.into_iter().filter(|token| token != name).collect();

        if kept.len() == before {
            return false;
        }

        self.excluded_project_names = join_exclusions(kept);
        true
    }
}

/// Split a raw exclusion string into trimmed, non-blank tokens.
#[must_use]
pub fn split_exclusions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Canonical serialization: blanks dropped, de-duplicated (first occurrence
/// wins), `,`-joined.
fn join_exclusions(tokens: Vec<String>) -> String {
    let mut seen = std::collections::HashSet::new();
    tokens
        .into_iter()
        .filter(|token| !token.is_empty() && seen.insert(token.clone()))
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Load a trigger configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid trigger
/// configuration.
pub fn load_trigger_config(path: &Path) -> Result<TriggerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<TriggerConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Save a trigger configuration as TOML.
///
/// The file is written to a sibling temporary path and renamed into place so
/// a concurrent reader never sees a truncated config.
///
/// # Errors
///
/// Returns an error if serialization or any filesystem step fails.
pub fn save_trigger_config(path: &Path, config: &TriggerConfig) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize trigger config")?;

    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
