//! Host capability set injected into the trigger.
//!
//! The trigger never reaches for a global host instance; everything it needs
//! to know about jobs, queues and builds comes through [`JobRepository`].
//! Every call is fallible: a lookup failure aborts the current tick, which
//! the trigger treats as a no-op.

use anyhow::Result;

use crate::model::{BuildRecord, Job, TriggerCause};

/// Read-mostly view of the host's jobs plus the single mutation the trigger
/// performs (requesting a build).
pub trait JobRepository {
    /// Look up a job by its short name.
    fn find_by_name(&self, name: &str) -> Result<Option<Job>>;

    /// Direct downstream jobs of `job`, in the host's natural order.
    fn downstream_of(&self, job: &Job) -> Result<Vec<Job>>;

    fn is_building(&self, job: &Job) -> Result<bool>;

    fn is_queued(&self, job: &Job) -> Result<bool>;

    /// Last build of `job`, if it was ever built.
    fn last_build(&self, job: &Job) -> Result<Option<BuildRecord>>;

    /// Ask the host to schedule a build of `job`.
    ///
    /// Returns `true` when a new build was scheduled and `false` when one was
    /// already waiting in the queue.
    fn schedule_build(&self, job: &Job, cause: &TriggerCause) -> Result<bool>;

    /// Whether the host is preparing to shut down and refuses new work.
    fn is_quieting_down(&self) -> Result<bool> {
        Ok(false)
    }
}
