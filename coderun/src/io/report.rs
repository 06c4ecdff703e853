//! Run report output: human summary for stdout and an optional JSON file.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::types::{RunReport, UnitOutcome};

/// Render the end-of-run summary.
///
/// Lists every failed unit with its file, block index and remote detail, then
/// the abort reason if the run did not reach `Done`.
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "coderun: attempted={} succeeded={} failed={} resets={}",
        report.attempted, report.succeeded, report.failed, report.resets
    );
    let _ = writeln!(
        out,
        "coderun: files succeeded={} failed={} skipped={}",
        report.succeeded_files.len(),
        report.failed_files.len(),
        report.skipped_files.len()
    );

    let failed: Vec<_> = report.failed_units().collect();
    if !failed.is_empty() {
        let _ = writeln!(out, "failed units:");
        for unit in failed {
            let location = match unit.block {
                Some(block) => format!("{} (block {block})", unit.path.display()),
                None => unit.path.display().to_string(),
            };
            let detail = match &unit.outcome {
                UnitOutcome::Failed { detail } => detail.as_str(),
                _ => "",
            };
            let _ = writeln!(out, "  - {location}: {}", first_line(detail));
        }
    }

    if let Some(abort) = &report.aborted {
        let _ = writeln!(out, "aborted [{}]: {}", abort.category, abort.message);
    }
    out
}

fn first_line(detail: &str) -> &str {
    detail.lines().next().unwrap_or_default()
}

/// Atomically write the report as pretty JSON (temp file + rename).
pub fn write_report_json(path: &Path, report: &RunReport) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(report).context("serialize report")?;
    buf.push('\n');
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp report {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace report {}", path.display()))?;
    Ok(())
}
