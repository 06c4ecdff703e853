//! Runtime lifecycle control (stop/start) and the periodic reset.

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::core::reset::reset_due;
use crate::error::RunError;
use crate::io::config::LifecycleConfig;
use crate::io::process::{run_with_timeout, shell_command};

const STDERR_TAIL_BYTES: usize = 2_000;

/// Stops and starts the external runtime.
pub trait Lifecycle {
    fn stop(&self) -> Result<(), RunError>;
    fn start(&self) -> Result<(), RunError>;
}

/// Lifecycle driven by a base shell command, e.g. `docker compose`.
#[derive(Debug, Clone)]
pub struct ShellLifecycle {
    base: String,
    stop_args: String,
    start_args: String,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ShellLifecycle {
    /// `None` when no base command is configured.
    pub fn from_config(cfg: &LifecycleConfig) -> Option<Self> {
        let base = cfg.command.as_deref()?.trim();
        Some(Self {
            base: base.to_string(),
            stop_args: cfg.stop_args.clone(),
            start_args: cfg.start_args.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            output_limit_bytes: cfg.output_limit_bytes,
        })
    }

    pub fn stop_command(&self) -> String {
        join_command(&self.base, &self.stop_args)
    }

    pub fn start_command(&self) -> String {
        join_command(&self.base, &self.start_args)
    }

    #[instrument(skip(self))]
    fn run(&self, line: &str) -> Result<(), RunError> {
        info!("running lifecycle command");
        let failed = |detail: String| RunError::Lifecycle {
            command: line.to_string(),
            detail,
        };
        let output = run_with_timeout(shell_command(line), self.timeout, self.output_limit_bytes)
            .map_err(|err| failed(format!("{err:#}")))?;
        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "lifecycle command timed out");
            return Err(failed(format!(
                "timed out after {}s",
                self.timeout.as_secs()
            )));
        }
        if output.truncated > 0 {
            warn!(truncated = output.truncated, "lifecycle output truncated");
        }
        if !output.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |code| code.to_string());
            let mut detail = format!("exit status {code}: {}", output.tail(STDERR_TAIL_BYTES));
            if output.truncated > 0 {
                detail.push_str(&format!(" [output truncated {} bytes]", output.truncated));
            }
            return Err(failed(detail));
        }
        Ok(())
    }
}

impl Lifecycle for ShellLifecycle {
    fn stop(&self) -> Result<(), RunError> {
        self.run(&self.stop_command())
    }

    fn start(&self) -> Result<(), RunError> {
        self.run(&self.start_command())
    }
}

fn join_command(base: &str, args: &str) -> String {
    let args = args.trim();
    if args.is_empty() {
        base.to_string()
    } else {
        format!("{base} {args}")
    }
}

/// Stop then start the runtime when `executed` hits a multiple of `reset_every`.
///
/// Returns whether a reset ran. The caller must reconnect after a reset.
pub fn maybe_reset<L: Lifecycle>(
    executed: u32,
    reset_every: Option<u32>,
    lifecycle: Option<&L>,
) -> Result<bool, RunError> {
    if !reset_due(executed, reset_every) {
        return Ok(false);
    }
    let lifecycle = lifecycle.ok_or_else(|| {
        RunError::Config("reset_every requires a lifecycle command".to_string())
    })?;
    info!(executed, "resetting runtime");
    lifecycle.stop()?;
    lifecycle.start()?;
    Ok(true)
}
