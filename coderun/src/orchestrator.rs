//! Orchestration for a full `coderun` invocation.
//!
//! Drives the run state machine:
//!
//! ```text
//! Init -> Connecting -> Running -> (Resetting -> Connecting -> Running)* -> Done | Aborted
//! ```
//!
//! Units are submitted strictly one at a time, in resolved file order and
//! document order within a file, because later code may depend on state left
//! in the runtime by earlier code.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, instrument, warn};

use crate::core::dialect::Dialect;
use crate::core::reset::reset_due;
use crate::core::types::{Abort, CodeUnit, Expectation, Phase, RunReport, UnitOutcome, UnitRecord};
use crate::error::RunError;
use crate::io::config::{CoderunConfig, FailurePolicy};
use crate::io::extractor::Extractor;
use crate::io::lifecycle::{Lifecycle, maybe_reset};
use crate::io::resolver::Resolver;
use crate::io::session::{Connector, RetryPolicy, Session, SubmitError, connect_with_retry};

/// Run context: collaborators plus the mutable state of one run.
pub struct Orchestrator<'a, C: Connector, L: Lifecycle> {
    resolver: Resolver,
    extractor: Extractor,
    connector: &'a C,
    lifecycle: Option<&'a L>,
    retry: RetryPolicy,
    reset_every: Option<u32>,
    on_failure: FailurePolicy,
    start_on_launch: bool,
    /// At most one live session; replaced (not closed) after a reset.
    session: Option<C::Session>,
    executed: u32,
    report: RunReport,
}

impl<'a, C: Connector, L: Lifecycle> Orchestrator<'a, C, L> {
    /// `base` anchors relative run/ignore specs and manifest entries.
    pub fn new(
        cfg: &CoderunConfig,
        base: &Path,
        dialect: Dialect,
        connector: &'a C,
        lifecycle: Option<&'a L>,
    ) -> Self {
        let extensions = cfg.extract.extension_table();
        Self {
            resolver: Resolver::new(base, extensions.clone(), cfg.resolve.max_depth)
                .with_manifest_extensions(&cfg.resolve.manifest_extensions),
            extractor: Extractor::new(dialect, extensions),
            connector,
            lifecycle,
            retry: RetryPolicy {
                max_retries: cfg.max_retries,
                delay: cfg.retry_delay(),
            },
            reset_every: cfg.reset_every.filter(|every| *every > 0),
            on_failure: cfg.on_failure,
            start_on_launch: cfg.lifecycle.start_on_launch,
            session: None,
            executed: 0,
            report: RunReport::default(),
        }
    }

    /// Run to `Done` or `Aborted` and return the report.
    #[instrument(skip(self), fields(dialect = %self.extractor.dialect()))]
    pub fn run(mut self, run_spec: &str, ignore_spec: Option<&str>) -> RunReport {
        match self.drive(run_spec, ignore_spec) {
            Ok(()) => {
                self.enter(Phase::Done);
                info!(
                    attempted = self.report.attempted,
                    failed = self.report.failed,
                    "run complete"
                );
            }
            Err(err) => {
                error!(category = err.category(), err = %err, "run aborted");
                self.enter(Phase::Aborted);
                self.report.aborted = Some(Abort {
                    category: err.category().to_string(),
                    message: err.to_string(),
                    exit_code: err.exit_code(),
                });
            }
        }
        self.report
    }

    fn drive(&mut self, run_spec: &str, ignore_spec: Option<&str>) -> Result<(), RunError> {
        self.enter(Phase::Init);
        let files = self
            .resolver
            .resolve(run_spec, ignore_spec)
            .map_err(RunError::resolution)?;
        info!(files = files.len(), "resolved files");

        if self.start_on_launch
            && let Some(lifecycle) = self.lifecycle
        {
            lifecycle.start()?;
        }
        self.connect()?;
        self.enter(Phase::Running);

        for path in &files.files {
            self.run_file(path)?;
        }
        Ok(())
    }

    fn connect(&mut self) -> Result<(), RunError> {
        self.enter(Phase::Connecting);
        // The previous handle is assumed invalid; drop it before opening another.
        self.session = None;
        let session = connect_with_retry(self.connector, self.extractor.dialect(), &self.retry)?;
        self.session = Some(session);
        Ok(())
    }

    fn run_file(&mut self, path: &Path) -> Result<(), RunError> {
        let units = match self.extractor.extract(path) {
            Ok(units) => units,
            Err(err) => {
                warn!(path = %path.display(), err = %format!("{err:#}"), "could not read file");
                self.report.attempted += 1;
                self.record(UnitRecord {
                    path: path.to_path_buf(),
                    block: None,
                    dialect: self.extractor.dialect(),
                    expect: Expectation::Success,
                    outcome: UnitOutcome::Failed {
                        detail: format!("{err:#}"),
                    },
                });
                self.report.failed_files.push(path.to_path_buf());
                return Ok(());
            }
        };
        if units.is_empty() {
            debug!(path = %path.display(), "no runnable code, skipping");
            self.report.skipped_files.push(path.to_path_buf());
            return Ok(());
        }

        info!(path = %path.display(), units = units.len(), "running file");
        let mut file_failed = false;
        let mut units = units.into_iter();
        while let Some(unit) = units.next() {
            let outcome = self.execute(&unit)?;
            let failed = outcome.is_failed();
            self.record(record_for(&unit, outcome));
            self.after_unit()?;

            if failed {
                file_failed = true;
                if self.on_failure == FailurePolicy::SkipFile {
                    for rest in units.by_ref() {
                        self.record(record_for(&rest, UnitOutcome::Skipped));
                    }
                }
            }
        }

        let bucket: &mut Vec<PathBuf> = if file_failed {
            &mut self.report.failed_files
        } else {
            &mut self.report.succeeded_files
        };
        bucket.push(path.to_path_buf());
        Ok(())
    }

    /// Submit one unit and classify the result against its expectation.
    fn execute(&mut self, unit: &CodeUnit) -> Result<UnitOutcome, RunError> {
        let label = unit.label();
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| RunError::Infrastructure {
                unit: label.clone(),
                detail: "no live session".to_string(),
            })?;

        debug!(unit = %label, "submitting");
        self.report.attempted += 1;
        let outcome = match (session.run(&unit.code), unit.expect) {
            (Ok(()), Expectation::Success) => UnitOutcome::Passed,
            (Ok(()), Expectation::Failure) => UnitOutcome::Failed {
                detail: "expected a failure but the code ran successfully".to_string(),
            },
            (Err(SubmitError::Execution(_)), Expectation::Failure) => UnitOutcome::Passed,
            (Err(err @ SubmitError::Execution(_)), Expectation::Success) => UnitOutcome::Failed {
                detail: err.to_string(),
            },
            (Err(SubmitError::Infrastructure(detail)), _) => {
                return Err(RunError::Infrastructure {
                    unit: label,
                    detail,
                });
            }
        };
        if let UnitOutcome::Failed { detail } = &outcome {
            warn!(unit = %label, %detail, "unit failed");
        }
        Ok(outcome)
    }

    /// Advance the executed counter and reset the runtime when due.
    fn after_unit(&mut self) -> Result<(), RunError> {
        self.executed += 1;
        if !reset_due(self.executed, self.reset_every) {
            return Ok(());
        }
        self.enter(Phase::Resetting);
        if maybe_reset(self.executed, self.reset_every, self.lifecycle)? {
            self.report.resets += 1;
        }
        self.connect()?;
        self.enter(Phase::Running);
        Ok(())
    }

    fn record(&mut self, record: UnitRecord) {
        match record.outcome {
            UnitOutcome::Passed => self.report.succeeded += 1,
            UnitOutcome::Failed { .. } => self.report.failed += 1,
            UnitOutcome::Skipped => {}
        }
        self.report.units.push(record);
    }

    fn enter(&mut self, phase: Phase) {
        debug!(?phase, executed = self.executed, "phase");
        self.report.phases.push(phase);
    }
}

fn record_for(unit: &CodeUnit, outcome: UnitOutcome) -> UnitRecord {
    UnitRecord {
        path: unit.path.clone(),
        block: unit.block,
        dialect: unit.dialect,
        expect: unit.expect,
        outcome,
    }
}
