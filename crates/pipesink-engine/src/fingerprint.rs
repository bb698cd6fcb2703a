//! Pipeline fingerprints.
//!
//! A fingerprint summarizes "which build of every pipeline job is the
//! latest". The per-job inputs from [`crate::evaluate`] are sorted, joined
//! with [`SEPARATOR`] and hashed with SHA-256; the lowercase hex digest is
//! what gets persisted. Sorting makes the digest independent of discovery
//! order: the same multiset of `(full_name, last_build_id)` pairs always
//! yields the same fingerprint.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Joins sorted inputs before hashing. Never appears in a job name.
pub const SEPARATOR: &str = ";";

/// Hex digest of a pipeline's fingerprint inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

/// How the current fingerprint relates to the persisted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOutcome {
    /// Nothing persisted yet; prime the baseline without triggering.
    NoBaseline,
    Unchanged,
    Changed,
}

impl Fingerprint {
    /// Compute the fingerprint of a set of inputs, in any order.
    #[must_use]
    pub fn compute<S: AsRef<str>>(inputs: &[S]) -> Self {
        let mut sorted: Vec<&str> = inputs.iter().map(AsRef::as_ref).collect();
        sorted.sort_unstable();

        let mut hasher = Sha256::new();
        for (i, input) in sorted.iter().enumerate() {
            if i > 0 {
                hasher.update(SEPARATOR.as_bytes());
            }
            hasher.update(input.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wrap a previously persisted value.
    #[must_use]
    pub fn from_persisted(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against the persisted fingerprint, if any.
    #[must_use]
    pub fn compare(&self, previous: Option<&Self>) -> ChangeOutcome {
        has_changed(self, previous)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classify `current` against `previous`.
///
/// A missing baseline is its own outcome and must not be read as a change.
#[must_use]
pub fn has_changed(current: &Fingerprint, previous: Option<&Fingerprint>) -> ChangeOutcome {
    match previous {
        None => ChangeOutcome::NoBaseline,
        Some(prev) if prev == current => ChangeOutcome::Unchanged,
        Some(_) => ChangeOutcome::Changed,
    }
}
