use std::fmt;

/// Machine-readable error codes shared by the store, lock and trigger layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    ConfigWriteFailed,
    FingerprintReadFailed,
    FingerprintWriteFailed,
    LockContention,
    HostQueryFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::ConfigWriteFailed => "E1002",
            Self::FingerprintReadFailed => "E3001",
            Self::FingerprintWriteFailed => "E3002",
            Self::LockContention => "E5001",
            Self::HostQueryFailed => "E7001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Trigger config parse error",
            Self::ConfigWriteFailed => "Trigger config write failed",
            Self::FingerprintReadFailed => "Pipeline fingerprint read failed",
            Self::FingerprintWriteFailed => "Pipeline fingerprint write failed",
            Self::LockContention => "Lock contention",
            Self::HostQueryFailed => "Job repository query failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix the trigger TOML and retry."),
            Self::ConfigWriteFailed | Self::FingerprintWriteFailed => {
                Some("Check disk space and write permissions.")
            }
            Self::FingerprintReadFailed => {
                Some("Delete the corrupt pipeline-context.fingerprint; the next tick re-primes it.")
            }
            Self::LockContention => Some("Another tick for the same owner is still running."),
            Self::HostQueryFailed => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
