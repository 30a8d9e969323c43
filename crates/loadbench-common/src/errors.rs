//! Error types for the benchmark harness.
//!
//! Two layers of errors live here:
//!
//! - [`ProcessError`] covers the low-level operating-system operations
//!   (spawn, signal, existence check) performed by `loadbench-process`.
//! - [`BenchError`] is the benchmark taxonomy. Apart from
//!   [`BenchError::Configuration`] and [`BenchError::Interrupted`], every
//!   variant is converted into a terminal status on a run result instead of
//!   aborting the session.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for benchmark operations.
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Benchmark-level error taxonomy.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BenchError {
    /// The server process could not be started (missing binary, bad arguments).
    #[error("Launch failed for strategy '{strategy}': {reason}")]
    LaunchFailure { strategy: String, reason: String },

    /// The readiness endpoint never returned success within the bound.
    #[error("Readiness timeout for strategy '{strategy}' after {timeout_secs}s")]
    ReadinessTimeout { strategy: String, timeout_secs: f64 },

    /// Graceful or forced termination failed. Logged, never propagated.
    #[error("Teardown failed for PID {pid}: {reason}")]
    TeardownFailure { pid: u32, reason: String },

    /// Something is already listening on the port the server would bind.
    #[error("Port {port} already in use")]
    PortInUse { port: u16 },

    /// The server process exited on its own before it became ready.
    #[error("Server for strategy '{strategy}' exited before becoming ready: {status}")]
    ExitedEarly { strategy: String, status: String },

    /// Invalid configuration. The only error that halts the program.
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// A shutdown signal arrived; the in-flight run was torn down.
    #[error("Interrupted by shutdown signal")]
    Interrupted,
}

impl BenchError {
    pub fn launch_failure(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LaunchFailure {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }

    pub fn readiness_timeout(strategy: impl Into<String>, timeout: Duration) -> Self {
        Self::ReadinessTimeout {
            strategy: strategy.into(),
            timeout_secs: timeout.as_secs_f64(),
        }
    }

    pub fn teardown_failure(pid: u32, reason: impl Into<String>) -> Self {
        Self::TeardownFailure {
            pid,
            reason: reason.into(),
        }
    }

    pub fn exited_early(strategy: impl Into<String>, status: impl Into<String>) -> Self {
        Self::ExitedEarly {
            strategy: strategy.into(),
            status: status.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether this error must halt the whole program instead of being
    /// recorded on a single run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

// ==============================================================================
// Process Errors
// ==============================================================================

/// Errors raised by the low-level process primitives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessError {
    #[error("Process spawn failed: {id} - {reason}")]
    SpawnFailed { id: String, reason: String },

    #[error("Process stop failed: {id} - {reason}")]
    StopFailed { id: String, reason: String },

    #[error("Process check failed: {id} - {reason}")]
    CheckFailed { id: String, reason: String },
}

impl ProcessError {
    pub fn spawn_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn stop_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StopFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn check_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CheckFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for process operations.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;
