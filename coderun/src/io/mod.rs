//! Side-effecting operations: filesystem, child processes, network sessions.

pub mod config;
pub mod extractor;
pub mod lifecycle;
pub mod process;
pub mod report;
pub mod resolver;
pub mod session;
