//! Deterministic, pure logic: fences, filtering, reset scheduling, report types.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod dialect;
pub mod fence;
pub mod filter;
pub mod reset;
pub mod types;
