use chrono::{DateTime, Utc};
use loadbench_common::RunStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Phases a single benchmark run moves through.
///
/// ```text
/// Starting -> Polling -> Ready | TimedOut | ProcessError -> TearingDown -> Done
/// ```
///
/// `Starting` may jump straight to `ProcessError` (spawn failure, busy
/// port), and `Polling` may jump straight to `TearingDown` when the run is
/// interrupted. Every non-initial phase can reach `TearingDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Starting,
    Polling,
    Ready,
    TimedOut,
    ProcessError,
    TearingDown,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Starting => write!(f, "starting"),
            RunPhase::Polling => write!(f, "polling"),
            RunPhase::Ready => write!(f, "ready"),
            RunPhase::TimedOut => write!(f, "timed_out"),
            RunPhase::ProcessError => write!(f, "process_error"),
            RunPhase::TearingDown => write!(f, "tearing_down"),
            RunPhase::Done => write!(f, "done"),
        }
    }
}

impl RunPhase {
    /// The run status this phase settles on, if it is an outcome phase.
    pub fn as_status(&self) -> Option<RunStatus> {
        match self {
            RunPhase::Ready => Some(RunStatus::Ready),
            RunPhase::TimedOut => Some(RunStatus::TimedOut),
            RunPhase::ProcessError => Some(RunStatus::ProcessError),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid run phase transition for '{run_id}': {from} -> {to}")]
pub struct InvalidTransition {
    pub run_id: String,
    pub from: RunPhase,
    pub to: RunPhase,
}

/// A recorded phase change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: RunPhase,
    pub to: RunPhase,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Tracks one run through its phases and remembers the outcome.
#[derive(Debug, Clone)]
pub struct RunStateMachine {
    run_id: String,
    current: RunPhase,
    outcome: Option<RunStatus>,
    history: Vec<PhaseTransition>,
}

impl RunStateMachine {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            current: RunPhase::Starting,
            outcome: None,
            history: Vec::new(),
        }
    }

    pub fn current_phase(&self) -> RunPhase {
        self.current
    }

    /// The outcome the run settled on, once it has reached an outcome phase.
    pub fn outcome(&self) -> Option<RunStatus> {
        self.outcome
    }

    pub fn history(&self) -> &[PhaseTransition] {
        &self.history
    }

    pub fn is_valid_transition(&self, target: RunPhase) -> bool {
        use RunPhase::*;

        match (self.current, target) {
            (Starting, Polling) => true,
            (Starting, ProcessError) => true,

            (Polling, Ready) => true,
            (Polling, TimedOut) => true,
            (Polling, ProcessError) => true,
            // Interrupted mid-poll
            (Polling, TearingDown) => true,

            (Ready, TearingDown) => true,
            (TimedOut, TearingDown) => true,
            (ProcessError, TearingDown) => true,

            (TearingDown, Done) => true,

            _ => false,
        }
    }

    pub fn transition_to(
        &mut self,
        target: RunPhase,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        if !self.is_valid_transition(target) {
            return Err(InvalidTransition {
                run_id: self.run_id.clone(),
                from: self.current,
                to: target,
            });
        }

        tracing::debug!("Run {} phase {} -> {}", self.run_id, self.current, target);

        self.history.push(PhaseTransition {
            from: self.current,
            to: target,
            timestamp: Utc::now(),
            reason,
        });
        self.current = target;
        if let Some(status) = target.as_status() {
            self.outcome = Some(status);
        }

        Ok(())
    }

    /// Number of times teardown was entered. At most one for a valid run.
    pub fn teardown_count(&self) -> usize {
        self.history
            .iter()
            .filter(|t| t.to == RunPhase::TearingDown)
            .count()
    }

    pub fn is_done(&self) -> bool {
        self.current == RunPhase::Done
    }
}
