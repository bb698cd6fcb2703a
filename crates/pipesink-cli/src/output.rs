//! Shared output layer for human/JSON parity across all CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and renders its result
//! either as short human text or as one pretty-printed JSON object. Errors
//! go to stderr in the same mode.

use std::io::{self, Write};

use pipesink_core::error::ErrorCode;
use serde::Serialize;

/// The output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    /// Returns `true` if JSON output was requested.
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// A structured error with optional hint and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Machine-readable error code (e.g. "E3002").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: None,
            error_code: None,
        }
    }

    /// An error carrying the code and hint of `code`.
    pub fn with_code(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            hint: code.hint().map(ToString::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

/// Render a serializable value to stdout in the requested format.
///
/// In JSON mode the value is serialized with `serde_json`; otherwise
/// `human_fn` writes the text form.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_value(mode, value, human_fn, &mut out)
}

fn write_value<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut *out, value)?;
            writeln!(out)?;
        }
        OutputMode::Human => human_fn(value, out)?,
    }
    Ok(())
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(mode, error, &mut out)
}

fn write_error(mode: OutputMode, error: &CliError, out: &mut dyn Write) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({ "error": error });
            serde_json::to_writer_pretty(&mut *out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Human => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(hint) = &error.hint {
                writeln!(out, "  hint: {hint}")?;
            }
        }
    }
    Ok(())
}
