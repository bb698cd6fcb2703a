//! In-memory host and fingerprint store for tests.
//!
//! Shared between unit tests and the integration tests under `tests/`
//! (which include this file with `#[path]`), so it only refers to
//! `pipesink_core` and std.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use pipesink_core::host::JobRepository;
use pipesink_core::model::{BuildRecord, BuildResult, Job, TriggerCause};
use pipesink_core::store::{FingerprintStore, StoreError};

#[derive(Debug, Clone)]
struct JobState {
    job: Job,
    downstream: Vec<String>,
    building: bool,
    queued: bool,
    last_build: Option<BuildRecord>,
}

/// A host whose jobs are declared up front by the test.
#[derive(Debug, Clone, Default)]
pub struct StaticRepo {
    jobs: BTreeMap<String, JobState>,
    failing_downstream: HashSet<String>,
    failing_lookups: bool,
    quieting_down: bool,
    scheduled: RefCell<Vec<(String, TriggerCause)>>,
}

impl StaticRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(mut self, job: Job, downstream: &[&str]) -> Self {
        self.jobs.insert(
            job.name.clone(),
            JobState {
                job,
                downstream: downstream.iter().map(ToString::to_string).collect(),
                building: false,
                queued: false,
                last_build: None,
            },
        );
        self
    }

    pub fn job(self, name: &str, downstream: &[&str]) -> Self {
        self.insert(Job::new(name), downstream)
    }

    pub fn disabled_job(self, name: &str, downstream: &[&str]) -> Self {
        self.insert(Job::new(name).with_disabled(true), downstream)
    }

    pub fn foldered_job(self, name: &str, full_name: &str, downstream: &[&str]) -> Self {
        self.insert(Job::new(name).with_full_name(full_name), downstream)
    }

    pub fn building(mut self, name: &str) -> Self {
        self.set_building(name, true);
        self
    }

    pub fn queued(mut self, name: &str) -> Self {
        self.state_mut(name).queued = true;
        self
    }

    pub fn built(mut self, name: &str, id: &str, result: BuildResult) -> Self {
        self.set_last_build(name, id, result);
        self
    }

    pub fn failing_downstream(mut self, name: &str) -> Self {
        self.failing_downstream.insert(name.to_string());
        self
    }

    pub fn failing_lookups(mut self) -> Self {
        self.failing_lookups = true;
        self
    }

    pub fn quieting_down(mut self) -> Self {
        self.quieting_down = true;
        self
    }

    pub fn set_building(&mut self, name: &str, building: bool) {
        self.state_mut(name).building = building;
    }

    pub fn set_last_build(&mut self, name: &str, id: &str, result: BuildResult) {
        self.state_mut(name).last_build = Some(BuildRecord::new(id, result));
    }

    fn state_mut(&mut self, name: &str) -> &mut JobState {
        self.jobs
            .get_mut(name)
            .unwrap_or_else(|| panic!("job '{name}' not declared"))
    }

    fn state(&self, name: &str) -> Result<&JobState> {
        self.jobs
            .get(name)
            .ok_or_else(|| anyhow!("job '{name}' not declared"))
    }

    /// The declared job, panicking if it does not exist.
    pub fn get(&self, name: &str) -> Job {
        self.jobs
            .get(name)
            .map(|s| s.job.clone())
            .unwrap_or_else(|| panic!("job '{name}' not declared"))
    }

    pub fn downstream_names(&self, name: &str) -> Vec<String> {
        self.jobs
            .get(name)
            .map(|s| s.downstream.clone())
            .unwrap_or_default()
    }

    /// Names of the jobs a build was requested for, in request order.
    pub fn scheduled(&self) -> Vec<String> {
        self.scheduled
            .borrow()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn causes(&self) -> Vec<TriggerCause> {
        self.scheduled
            .borrow()
            .iter()
            .map(|(_, cause)| cause.clone())
            .collect()
    }
}

impl JobRepository for StaticRepo {
    fn find_by_name(&self, name: &str) -> Result<Option<Job>> {
        if self.failing_lookups {
            return Err(anyhow!("host unavailable"));
        }
        Ok(self.jobs.get(name).map(|s| s.job.clone()))
    }

    fn downstream_of(&self, job: &Job) -> Result<Vec<Job>> {
        if self.failing_downstream.contains(&job.name) {
            return Err(anyhow!("downstream listing failed"));
        }
        let state = self.state(&job.name)?;
        Ok(state
            .downstream
            .iter()
            .map(|name| {
                self.jobs
                    .get(name)
                    .map_or_else(|| Job::new(name.as_str()), |s| s.job.clone())
            })
            .collect())
    }

    fn is_building(&self, job: &Job) -> Result<bool> {
        Ok(self.state(&job.name)?.building)
    }

    fn is_queued(&self, job: &Job) -> Result<bool> {
        Ok(self.state(&job.name)?.queued)
    }

    fn last_build(&self, job: &Job) -> Result<Option<BuildRecord>> {
        Ok(self.state(&job.name)?.last_build.clone())
    }

    fn schedule_build(&self, job: &Job, cause: &TriggerCause) -> Result<bool> {
        let already_queued = self.state(&job.name)?.queued;
        self.scheduled
            .borrow_mut()
            .push((job.name.clone(), cause.clone()));
        Ok(!already_queued)
    }

    fn is_quieting_down(&self) -> Result<bool> {
        Ok(self.quieting_down)
    }
}

/// Fingerprint store kept in memory, with optional write failures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<PathBuf, String>>,
    writes: RefCell<usize>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn value(&self, owner_dir: &Path) -> Option<String> {
        self.values.borrow().get(owner_dir).cloned()
    }

    pub fn seed(&self, owner_dir: &Path, value: &str) {
        self.values
            .borrow_mut()
            .insert(owner_dir.to_path_buf(), value.to_string());
    }

    pub fn write_count(&self) -> usize {
        *self.writes.borrow()
    }
}

impl FingerprintStore for MemoryStore {
    fn read(&self, owner_dir: &Path) -> Result<Option<String>, StoreError> {
        Ok(self.value(owner_dir))
    }

    fn write(&self, owner_dir: &Path, value: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Write {
                path: owner_dir.to_path_buf(),
                source: io::Error::other("disk full"),
            });
        }
        *self.writes.borrow_mut() += 1;
        self.seed(owner_dir, value);
        Ok(())
    }
}
