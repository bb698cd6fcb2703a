#![forbid(unsafe_code)]
//! pipesink-engine library.
//!
//! Decides, once per scheduler tick, whether a pipeline's sink job should be
//! built: discovers the pipeline graph, rejects cycles, checks activity and
//! health, and compares the pipeline fingerprint with the persisted one.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types. The trigger itself
//!   never returns an error; faults become [`trigger::TickOutcome::Faulted`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod evaluate;
pub mod fanout;
pub mod fingerprint;
pub mod graph;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use evaluate::{Activity, Evaluation, PipelineHealth, evaluate};
pub use fanout::{FanoutReport, TriggerRegistry, propagate_delete, propagate_rename};
pub use fingerprint::{ChangeOutcome, Fingerprint, has_changed};
pub use graph::{PipelineGraph, find_cycles, has_cycle};
pub use trigger::{PipelineSinkTrigger, TickOutcome};
