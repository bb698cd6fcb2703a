//! Job and build model consumed by the trigger.
//!
//! A [`Job`] is a lightweight, cloneable reference to a job owned by the
//! host. Only identity (`name`), the display path used in fingerprints
//! (`full_name`) and the `disabled` flag travel with the value; everything
//! that changes while a build runs is asked of the
//! [`JobRepository`](crate::host::JobRepository) at evaluation time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A reference to a job known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Job {
    /// Stable short name; the identity used in trigger configuration.
    pub name: String,
    /// Fully qualified name (folder path included) used in fingerprints.
    pub full_name: String,
    /// Disabled jobs are never traversed and never triggered.
    pub disabled: bool,
}

impl Job {
    /// An enabled top-level job whose full name equals its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            full_name: name.clone(),
            name,
            disabled: false,
        }
    }

    #[must_use]
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self
    }

    #[must_use]
    pub const fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ---------------------------------------------------------------------------
// BuildResult
// ---------------------------------------------------------------------------

/// Outcome of a completed build, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    Unstable,
    Failure,
    NotBuilt,
    Aborted,
}

impl BuildResult {
    /// `true` if `self` is strictly worse than `other`.
    #[must_use]
    pub fn is_worse_than(self, other: Self) -> bool {
        self > other
    }

    /// `true` for results that make a pipeline node unhealthy: anything
    /// strictly worse than [`BuildResult::Unstable`].
    #[must_use]
    pub fn is_unhealthy(self) -> bool {
        self.is_worse_than(Self::Unstable)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Unstable => "UNSTABLE",
            Self::Failure => "FAILURE",
            Self::NotBuilt => "NOT_BUILT",
            Self::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown build result name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown build result '{0}' (expected SUCCESS, UNSTABLE, FAILURE, NOT_BUILT or ABORTED)")]
pub struct ParseBuildResultError(pub String);

impl FromStr for BuildResult {
    type Err = ParseBuildResultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(Self::Success),
            "UNSTABLE" => Ok(Self::Unstable),
            "FAILURE" => Ok(Self::Failure),
            "NOT_BUILT" => Ok(Self::NotBuilt),
            "ABORTED" => Ok(Self::Aborted),
            _ => Err(ParseBuildResultError(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildRecord / TriggerCause
// ---------------------------------------------------------------------------

/// The last completed build of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: String,
    pub result: BuildResult,
}

impl BuildRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, result: BuildResult) -> Self {
        Self {
            id: id.into(),
            result,
        }
    }
}

/// Cause attached to a sink build requested by the trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerCause {
    /// Name of the job that owns the trigger.
    pub owner: String,
}

impl TriggerCause {
    pub const SHORT_DESCRIPTION: &'static str = "Started by pipeline sink trigger";

    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
        }
    }

    #[must_use]
    pub const fn short_description(&self) -> &'static str {
        Self::SHORT_DESCRIPTION
    }
}
