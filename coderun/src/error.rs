//! Fatal run errors.
//!
//! Every variant aborts the run. Code-level failures of individual units are
//! not errors; they are recorded in the report as `UnitOutcome::Failed`.

use thiserror::Error;

use crate::exit_codes;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// Invalid option combination, detected before any work starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A run path or manifest entry could not be resolved.
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// Every connection attempt failed.
    #[error("could not connect to {endpoint} after {attempts} attempts: {last_error}")]
    Connection {
        endpoint: String,
        attempts: u32,
        last_error: String,
    },

    /// A lifecycle stop/start command failed; runtime state is unknown.
    #[error("lifecycle command `{command}` failed: {detail}")]
    Lifecycle { command: String, detail: String },

    /// The session broke while submitting a unit.
    #[error("session lost while running {unit}: {detail}")]
    Infrastructure { unit: String, detail: String },
}

impl RunError {
    /// Stable label used in diagnostics and JSON reports.
    pub fn category(&self) -> &'static str {
        match self {
            RunError::Config(_) => "config",
            RunError::Resolution(_) => "resolution",
            RunError::Connection { .. } => "connection",
            RunError::Lifecycle { .. } => "lifecycle",
            RunError::Infrastructure { .. } => "infrastructure",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(_) => exit_codes::USAGE,
            RunError::Resolution(_) => exit_codes::RESOLUTION,
            RunError::Connection { .. } => exit_codes::CONNECTION,
            RunError::Lifecycle { .. } => exit_codes::LIFECYCLE,
            RunError::Infrastructure { .. } => exit_codes::INFRASTRUCTURE,
        }
    }

    /// Wrap a resolver error, keeping its context chain on one line.
    pub fn resolution(err: anyhow::Error) -> Self {
        RunError::Resolution(format!("{err:#}"))
    }
}
