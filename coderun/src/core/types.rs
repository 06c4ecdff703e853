//! Shared deterministic types for extraction, execution and reporting.
//!
//! These types define the contracts between the resolver, extractor and
//! orchestrator. They carry no I/O handles and serialize to stable JSON.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::dialect::Dialect;

/// What the submitter expects the remote runtime to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    Success,
    /// Block marked `should-fail`: passes only when the runtime reports a failure.
    Failure,
}

/// One executable payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnit {
    pub path: PathBuf,
    pub dialect: Dialect,
    /// 1-based ordinal of the fenced block in its file; `None` for whole-file units.
    pub block: Option<usize>,
    pub expect: Expectation,
    pub code: String,
}

impl CodeUnit {
    /// `path` or `path#block` for log lines and reports.
    pub fn label(&self) -> String {
        match self.block {
            Some(block) => format!("{}#{}", self.path.display(), block),
            None => self.path.display().to_string(),
        }
    }
}

/// Error detail reported by the remote runtime, passed through uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFailure {
    #[serde(default)]
    pub category: Option<String>,
    pub message: String,
}

/// Per-unit result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Passed,
    Failed { detail: String },
    /// Not submitted because an earlier unit of the same file failed.
    Skipped,
}

impl UnitOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, UnitOutcome::Failed { .. })
    }
}

/// Report row for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub path: PathBuf,
    pub block: Option<usize>,
    pub dialect: Dialect,
    pub expect: Expectation,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

/// Orchestrator state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Connecting,
    Running,
    Resetting,
    Done,
    Aborted,
}

/// Why a run ended early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abort {
    pub category: String,
    pub message: String,
    pub exit_code: i32,
}

/// Aggregated outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub resets: u32,
    pub succeeded_files: Vec<PathBuf>,
    pub failed_files: Vec<PathBuf>,
    pub skipped_files: Vec<PathBuf>,
    pub units: Vec<UnitRecord>,
    pub phases: Vec<Phase>,
    pub aborted: Option<Abort>,
}

impl RunReport {
    pub fn failed_units(&self) -> impl Iterator<Item = &UnitRecord> {
        self.units.iter().filter(|unit| unit.outcome.is_failed())
    }

    /// True when the run reached `Done` with no failed unit.
    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.failed == 0
    }
}
