//! Stable exit codes for the coderun CLI.

/// Run finished and every unit passed.
pub const OK: i32 = 0;
/// Run finished but at least one unit failed.
pub const UNITS_FAILED: i32 = 1;
/// Invalid invocation or configuration.
pub const USAGE: i32 = 2;
/// A run path or manifest entry could not be resolved.
pub const RESOLUTION: i32 = 3;
/// Connection retries were exhausted.
pub const CONNECTION: i32 = 4;
/// A lifecycle stop/start command failed.
pub const LIFECYCLE: i32 = 5;
/// The session was lost mid-run.
pub const INFRASTRUCTURE: i32 = 6;
/// The run finished cleanly but the requested JSON report could not be written.
pub const REPORT_WRITE: i32 = 7;
