//! # Loadbench Common
//!
//! Common types and errors shared across the loadbench crates.
//!
//! This crate provides the foundational pieces every other crate builds on:
//! the benchmark error taxonomy, the low-level process error type, and the
//! small domain types (strategy identifiers, run statuses, teardown outcomes)
//! that flow between the runner and the report.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{BenchError, BenchResult, ProcessError, ProcessResult};
pub use types::{RunStatus, StrategyId, TeardownOutcome};
