//! Rename/delete fan-out across every trigger instance.
//!
//! When a job is renamed or deleted, every pipeline sink trigger on the host
//! gets a chance to update its names. Owners whose trigger changed are saved
//! through the registry. A failed save is logged and skipped so one broken
//! owner cannot stop the others from being updated.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::trigger::PipelineSinkTrigger;

/// The host's view of all trigger instances of this kind.
pub trait TriggerRegistry {
    /// Every pipeline sink trigger currently configured on the host.
    fn triggers(&self) -> Vec<Arc<PipelineSinkTrigger>>;

    /// Persist the owner of `trigger` after its configuration changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner could not be written.
    fn save(&self, trigger: &PipelineSinkTrigger) -> Result<()>;
}

/// Owners touched by one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    /// Owners whose trigger changed and were saved.
    pub saved: Vec<String>,
    /// Owners whose trigger changed but could not be saved.
    pub failed: Vec<String>,
}

impl FanoutReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Apply a rename of `old_name` to `new_name` to every trigger.
pub fn propagate_rename<G>(registry: &G, old_name: &str, new_name: &str) -> FanoutReport
where
    G: TriggerRegistry + ?Sized,
{
    info!(%old_name, %new_name, "propagating job rename");
    propagate(registry, |trigger| trigger.on_job_renamed(old_name, new_name))
}

/// Apply the deletion of `name` to every trigger.
pub fn propagate_delete<G>(registry: &G, name: &str) -> FanoutReport
where
    G: TriggerRegistry + ?Sized,
{
    info!(%name, "propagating job deletion");
    propagate(registry, |trigger| trigger.on_job_deleted(name))
}

fn propagate<G, F>(registry: &G, mut apply: F) -> FanoutReport
where
    G: TriggerRegistry + ?Sized,
    F: FnMut(&PipelineSinkTrigger) -> bool,
{
    let mut report = FanoutReport::default();
    for trigger in registry.triggers() {
        if !apply(&trigger) {
            debug!(owner = trigger.owner(), "trigger unaffected");
            continue;
        }
        match registry.save(&trigger) {
            Ok(()) => report.saved.push(trigger.owner().to_string()),
            Err(err) => {
                warn!(owner = trigger.owner(), "failed to save updated trigger: {err:#}");
                report.failed.push(trigger.owner().to_string());
            }
        }
    }
    report
}
