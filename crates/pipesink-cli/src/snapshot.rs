//! Offline host snapshot.
//!
//! A TOML file describing every job the host knows, its downstream jobs and
//! its current state. The CLI runs trigger ticks against it instead of a
//! live host:
//!
//! ```toml
//! quieting_down = false
//!
//! [[job]]
//! name = "Root"
//! downstream = ["Sink"]
//! [job.last_build]
//! id = "12"
//! result = "SUCCESS"
//!
//! [[job]]
//! name = "Sink"
//! full_name = "release/Sink"
//! building = false
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use tracing::debug;

use pipesink_core::host::JobRepository;
use pipesink_core::model::{BuildRecord, Job, TriggerCause};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotFile {
    #[serde(default)]
    quieting_down: bool,
    #[serde(default, rename = "job")]
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct JobEntry {
    name: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    building: bool,
    #[serde(default)]
    queued: bool,
    #[serde(default)]
    downstream: Vec<String>,
    #[serde(default)]
    last_build: Option<BuildRecord>,
}

impl JobEntry {
    fn job(&self) -> Job {
        let job = Job::new(self.name.as_str()).with_disabled(self.disabled);
        match &self.full_name {
            Some(full_name) => job.with_full_name(full_name.as_str()),
            None => job,
        }
    }
}

/// A host loaded from a snapshot file.
#[derive(Debug)]
pub struct HostSnapshot {
    quieting_down: bool,
    jobs: BTreeMap<String, JobEntry>,
    scheduled: RefCell<Vec<String>>,
}

impl HostSnapshot {
    /// Load and validate a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, a job is
    /// declared twice, or a downstream name is not declared.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read host snapshot {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("invalid host snapshot {}", path.display()))
    }

    /// Parse a snapshot from TOML text.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn parse(content: &str) -> Result<Self> {
        let file: SnapshotFile = toml::from_str(content)?;

        let mut jobs = BTreeMap::new();
        for entry in file.jobs {
            if jobs.contains_key(&entry.name) {
                bail!("job '{}' is declared more than once", entry.name);
            }
            jobs.insert(entry.name.clone(), entry);
        }
        for entry in jobs.values() {
            if let Some(missing) = entry.downstream.iter().find(|d| !jobs.contains_key(*d)) {
                bail!("job '{}' lists undeclared downstream job '{missing}'", entry.name);
            }
        }

        debug!(jobs = jobs.len(), "host snapshot loaded");
        Ok(Self {
            quieting_down: file.quieting_down,
            jobs,
            scheduled: RefCell::new(Vec::new()),
        })
    }

    /// Jobs a build was requested for during this run, in request order.
    pub fn scheduled(&self) -> Vec<String> {
        self.scheduled.borrow().clone()
    }

    fn entry(&self, name: &str) -> Result<&JobEntry> {
        self.jobs
            .get(name)
            .ok_or_else(|| anyhow!("job '{name}' is not in the host snapshot"))
    }
}

impl JobRepository for HostSnapshot {
    fn find_by_name(&self, name: &str) -> Result<Option<Job>> {
        Ok(self.jobs.get(name).map(JobEntry::job))
    }

    fn downstream_of(&self, job: &Job) -> Result<Vec<Job>> {
        self.entry(&job.name)?
            .downstream
            .iter()
            .map(|name| self.entry(name).map(JobEntry::job))
            .collect()
    }

    fn is_building(&self, job: &Job) -> Result<bool> {
        Ok(self.entry(&job.name)?.building)
    }

    fn is_queued(&self, job: &Job) -> Result<bool> {
        Ok(self.entry(&job.name)?.queued)
    }

    fn last_build(&self, job: &Job) -> Result<Option<BuildRecord>> {
        Ok(self.entry(&job.name)?.last_build.clone())
    }

    fn schedule_build(&self, job: &Job, cause: &TriggerCause) -> Result<bool> {
        let already_queued = self.entry(&job.name)?.queued;
        debug!(job = %job.name, owner = %cause.owner, "build requested");
        self.scheduled.borrow_mut().push(job.name.clone());
        Ok(!already_queued)
    }

    fn is_quieting_down(&self) -> Result<bool> {
        Ok(self.quieting_down)
    }
}
