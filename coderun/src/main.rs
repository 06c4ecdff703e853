//! `coderun` command-line entry point.
//!
//! Runs code from source files and fenced documentation blocks against a
//! remote execution runtime, one unit at a time, and reports what failed.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use coderun::core::dialect::Dialect;
use coderun::core::types::RunReport;
use coderun::exit_codes;
use coderun::io::config::{CliOverrides, CoderunConfig, FailurePolicy, load_config};
use coderun::io::lifecycle::ShellLifecycle;
use coderun::io::report::{render_summary, write_report_json};
use coderun::io::session::HttpConnector;
use coderun::logging;
use coderun::orchestrator::Orchestrator;

/// Single-dash abbreviations accepted for compatibility with older scripts.
const LEGACY_FLAGS: &[(&str, &str)] = &[
    ("-rbf", "--reset-between-files"),
    ("-dc", "--lifecycle-command"),
    ("-ip", "--ignore-path"),
    ("-mr", "--max-retries"),
];

#[derive(Parser, Debug)]
#[command(
    name = "coderun",
    version,
    about = "Run code from source files and documentation against a remote runtime"
)]
struct Cli {
    /// Host of the execution service (bare name or http(s):// URL).
    host: String,
    /// Port of the execution service.
    port: u16,
    /// Session dialect; only code of this dialect is run.
    #[arg(value_enum)]
    session_kind: Dialect,
    /// File, directory or manifest to run.
    run_path: String,
    /// Reset the runtime after every N executed units.
    #[arg(long, value_name = "N")]
    reset_between_files: Option<u32>,
    /// Base command controlling the runtime, e.g. "docker compose".
    #[arg(long, value_name = "CMD")]
    lifecycle_command: Option<String>,
    /// File, directory or manifest to exclude.
    #[arg(long, value_name = "PATH")]
    ignore_path: Option<String>,
    /// Connection retries after the first attempt.
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,
    /// Delay between connection attempts.
    #[arg(long, value_name = "MS")]
    retry_delay_ms: Option<u64>,
    /// What to do with the rest of a file after one of its units fails.
    #[arg(long, value_enum)]
    on_failure: Option<FailurePolicy>,
    /// TOML config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Also write the run report as JSON.
    #[arg(long, value_name = "PATH")]
    report_json: Option<PathBuf>,
    /// Log progress at info level (RUST_LOG still wins).
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
            reset_every: self.reset_between_files,
            lifecycle_command: self.lifecycle_command.clone(),
            on_failure: self.on_failure,
        }
    }
}

/// Rewrite legacy single-dash flags (`-rbf 3`, `-dc=cmd`) to their long forms.
fn normalize_legacy_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            for (short, long) in LEGACY_FLAGS {
                if text == *short {
                    return OsString::from(*long);
                }
                let inline = text.strip_prefix(short).and_then(|rest| rest.strip_prefix('='));
                if let Some(value) = inline {
                    return OsString::from(format!("{long}={value}"));
                }
            }
            arg
        })
        .collect()
}

fn main() {
    let code = real_main();
    let _ = std::io::stdout().flush();
    std::process::exit(code);
}

fn real_main() -> i32 {
    let cli = Cli::parse_from(normalize_legacy_flags(std::env::args_os()));
    logging::init(cli.verbose);

    let cfg = match load_merged_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("coderun: {err:#}");
            return exit_codes::USAGE;
        }
    };

    let report = match run(&cli, &cfg) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("coderun: {err:#}");
            return exit_codes::USAGE;
        }
    };

    print!("{}", render_summary(&report));
    let mut report_written = true;
    if let Some(path) = &cli.report_json
        && let Err(err) = write_report_json(path, &report)
    {
        eprintln!("coderun: {err:#}");
        report_written = false;
    }
    final_exit_code(exit_code(&report), report_written)
}

fn load_merged_config(cli: &Cli) -> Result<CoderunConfig> {
    let cfg = match &cli.config {
        Some(path) => load_config(path)?,
        None => CoderunConfig::default(),
    };
    cfg.with_overrides(&cli.overrides())
}

fn run(cli: &Cli, cfg: &CoderunConfig) -> Result<RunReport> {
    let base = std::env::current_dir().context("resolve working directory")?;
    let connector = HttpConnector::new(&cli.host, cli.port, cfg.connect_timeout())?;
    let lifecycle = ShellLifecycle::from_config(&cfg.lifecycle);
    let orchestrator = Orchestrator::new(
        cfg,
        &base,
        cli.session_kind,
        &connector,
        lifecycle.as_ref(),
    );
    Ok(orchestrator.run(&cli.run_path, cli.ignore_path.as_deref()))
}

fn exit_code(report: &RunReport) -> i32 {
    match &report.aborted {
        Some(abort) => abort.exit_code,
        None if report.failed > 0 => exit_codes::UNITS_FAILED,
        None => exit_codes::OK,
    }
}

/// A lost JSON report only changes the exit code of an otherwise clean run.
fn final_exit_code(run_code: i32, report_written: bool) -> i32 {
    if run_code == exit_codes::OK && !report_written {
        exit_codes::REPORT_WRITE
    } else {
        run_code
    }
}
