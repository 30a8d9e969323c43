//! # Loadbench Benchmark
//!
//! Lifecycle benchmarking of model-loading strategies.
//!
//! This crate provides:
//! - Launch configuration, strategy presets and command rendering
//! - The runner (`run_one`): spawn, poll for readiness, tear down
//! - Run comparison (`compare`) and the session summary
//! - YAML configuration loading and validation

pub mod config;
pub mod launch;
pub mod process;
pub mod report;
pub mod runner;
pub mod session;

#[cfg(test)]
mod testing;

// Re-export main types
pub use config::{BenchmarkConfig, RunnerConfig, StrategyOverrides, DEFAULT_ACCEPTANCE_THRESHOLD};
pub use launch::{
    LaunchConfig, ServerCommand, DEFAULT_BASELINE_PORT, DEFAULT_CANDIDATE_PORT, DEFAULT_CONCURRENCY,
    STANDARD_STRATEGY, STREAMER_STRATEGY,
};
pub use process::{ChildServer, LocalLauncher, ProcessGuard, ServerLauncher, ServerProcess};
pub use report::{compare, compare_with, BenchmarkSummary, ComparisonReport, Extrapolation, LoadVerdict};
pub use runner::{BenchmarkRunner, RunResult};
pub use session::{BenchmarkPlan, BenchmarkSession};
