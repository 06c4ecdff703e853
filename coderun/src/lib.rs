//! Run code from source files and documentation against a remote runtime.
//!
//! The crate resolves run/ignore specs into an ordered file list, extracts
//! code units (whole source files, or fenced blocks from documentation), and
//! submits them one at a time to a long-lived remote session, resetting the
//! runtime every N units when asked. The architecture keeps a strict split:
//!
//! - **[`core`](crate::core)**: Pure, deterministic logic (fence scanning, filtering,
//!   reset scheduling, report types). No I/O.
//! - **[`io`]**: Side effects (filesystem walks, lifecycle commands, HTTP
//!   sessions), behind traits so tests can script them.
//!
//! [`orchestrator`] ties the two together into the run state machine.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
