//! Core domain types shared by the runner and the report.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy identifier - names one model-loading configuration.
///
/// # Example
/// ```
/// use loadbench_common::StrategyId;
///
/// let id = StrategyId::from("standard");
/// assert_eq!(id.as_str(), "standard");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyId(String);

impl StrategyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StrategyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StrategyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal status of one benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The readiness endpoint returned success.
    Ready,
    /// The readiness endpoint never succeeded within the bound.
    TimedOut,
    /// The server could not be started, or died before becoming ready.
    ProcessError,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Ready => "ready",
            RunStatus::TimedOut => "timed_out",
            RunStatus::ProcessError => "process_error",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, RunStatus::Ready)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the teardown of a run's server process concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TeardownOutcome {
    /// No process was ever started, so there was nothing to stop.
    NotNeeded,
    /// The process exited within the graceful window.
    Graceful,
    /// The process had to be force-killed.
    Forced,
    /// Termination failed; the reason is kept for diagnostics only.
    Failed(String),
}

impl fmt::Display for TeardownOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownOutcome::NotNeeded => write!(f, "not_needed"),
            TeardownOutcome::Graceful => write!(f, "graceful"),
            TeardownOutcome::Forced => write!(f, "forced"),
            TeardownOutcome::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}
