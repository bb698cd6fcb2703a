#![forbid(unsafe_code)]
//! pipesink-core library.
//!
//! Job model, the host capability traits the trigger is built against,
//! trigger configuration with rename/delete maintenance, and per-owner
//! fingerprint persistence.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums with an [`error::ErrorCode`] for the
//!   fingerprint store; `anyhow::Result` at the host and config seams.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod error;
pub mod host;
pub mod model;
pub mod store;

pub use config::{TriggerConfig, load_trigger_config, save_trigger_config, split_exclusions};
pub use error::ErrorCode;
pub use host::JobRepository;
pub use model::{BuildRecord, BuildResult, Job, TriggerCause};
pub use store::{FINGERPRINT_FILE_NAME, FileFingerprintStore, FingerprintStore, StoreError};
