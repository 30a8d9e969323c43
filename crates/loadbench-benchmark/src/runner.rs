//! The lifecycle benchmark runner.
//!
//! One call to [`BenchmarkRunner::run_one`] owns exactly one server process:
//!
//! ```text
//! Starting -> Polling -> Ready | TimedOut | ProcessError -> TearingDown -> Done
//! ```
//!
//! Every per-run failure becomes a status on the returned [`RunResult`];
//! nothing is raised to the caller, so one broken strategy never aborts the
//! comparison of the others.
//!
//! A shutdown request (see [`BenchmarkRunner::with_shutdown`]) ends polling
//! early and goes through the same teardown as any other outcome.

use crate::config::RunnerConfig;
use crate::launch::{LaunchConfig, ServerCommand};
use crate::process::{LocalLauncher, ProcessGuard, ServerLauncher};
use chrono::{DateTime, Utc};
use loadbench_common::{BenchError, RunStatus, StrategyId, TeardownOutcome};
use loadbench_monitoring::{
    port_accepts_connections, HttpReadinessProbe, ProbeOutcome, ReadinessEndpoint, ReadinessProbe,
};
use loadbench_state::{RunPhase, RunStateMachine};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Outcome of one benchmark run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub strategy: StrategyId,
    pub status: RunStatus,
    /// Seconds from process start to the first successful readiness check.
    /// Present only when `status` is `ready`.
    pub elapsed_secs: Option<f64>,
    pub started_at: DateTime<Utc>,
    /// Readiness probes issued.
    pub polls: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub teardown: TeardownOutcome,
}

impl RunResult {
    /// A successful run that became ready after `elapsed_secs` (clamped at 0).
    pub fn ready(strategy: impl Into<StrategyId>, elapsed_secs: f64) -> Self {
        Self::base(strategy, RunStatus::Ready, Some(elapsed_secs.max(0.0)))
    }

    pub fn timed_out(strategy: impl Into<StrategyId>) -> Self {
        Self::base(strategy, RunStatus::TimedOut, None)
    }

    pub fn process_error(strategy: impl Into<StrategyId>, detail: impl Into<String>) -> Self {
        let mut result = Self::base(strategy, RunStatus::ProcessError, None);
        result.detail = Some(detail.into());
        result
    }

    fn base(strategy: impl Into<StrategyId>, status: RunStatus, elapsed_secs: Option<f64>) -> Self {
        Self {
            strategy: strategy.into(),
            status,
            elapsed_secs,
            started_at: Utc::now(),
            polls: 0,
            detail: None,
            teardown: TeardownOutcome::NotNeeded,
        }
    }

    pub fn elapsed(&self) -> Option<f64> {
        self.elapsed_secs
    }

    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }
}

/// What the polling loop concluded, before teardown.
#[derive(Debug)]
enum PollOutcome {
    Ready { elapsed: Duration, polls: u32 },
    TimedOut { polls: u32 },
    ExitedEarly { status: String, polls: u32 },
    Interrupted { polls: u32 },
}

/// Runs strategies one at a time against a launcher and a readiness probe.
pub struct BenchmarkRunner {
    config: RunnerConfig,
    server: ServerCommand,
    launcher: Box<dyn ServerLauncher>,
    probe: Box<dyn ReadinessProbe>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl BenchmarkRunner {
    /// Runner spawning real local processes and probing over HTTP.
    pub fn new(config: RunnerConfig, server: ServerCommand) -> Self {
        let launcher = Box::new(LocalLauncher::new(config.server_output));
        let probe = Box::new(HttpReadinessProbe::new(config.probe_timeout));
        Self::with_parts(config, server, launcher, probe)
    }

    pub fn with_parts(
        config: RunnerConfig,
        server: ServerCommand,
        launcher: Box<dyn ServerLauncher>,
        probe: Box<dyn ReadinessProbe>,
    ) -> Self {
        Self {
            config,
            server,
            launcher,
            probe,
            shutdown: None,
        }
    }

    /// Stop polling once `shutdown` turns true. The live server is still
    /// stopped gracefully before the run returns.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().map_or(false, |rx| *rx.borrow())
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn endpoint_for(&self, launch: &LaunchConfig) -> ReadinessEndpoint {
        let endpoint = ReadinessEndpoint::new(&self.config.probe_host, launch.port, &self.config.health_path);
        if self.config.verify_model {
            let expected = self
                .config
                .expected_model
                .clone()
                .unwrap_or_else(|| launch.model_source.clone());
            endpoint.with_expected_model(expected)
        } else {
            endpoint
        }
    }

    /// Benchmark one strategy: spawn, poll until ready or `ready_timeout`,
    /// then tear down. Always returns a result; never raises.
    pub async fn run_one(&self, launch: &LaunchConfig, ready_timeout: Duration) -> RunResult {
        let (result, machine) = self.run_tracked(launch, ready_timeout).await;

        debug_assert!(machine.is_done());
        debug_assert_eq!(machine.teardown_count(), 1);
        debug!(
            "Run '{}' finished: status={} outcome={:?} phases={:?}",
            result.strategy,
            result.status,
            machine.outcome(),
            machine.history().iter().map(|t| t.to).collect::<Vec<_>>()
        );

        result
    }

    async fn run_tracked(&self, launch: &LaunchConfig, ready_timeout: Duration) -> (RunResult, RunStateMachine) {
        let strategy = launch.strategy.clone();
        let started_at = Utc::now();
        let mut machine = RunStateMachine::new(strategy.as_str());
        let mut guard = ProcessGuard::empty(strategy.clone());

        let endpoint = self.endpoint_for(launch);
        let command = self.server.render(launch);
        info!("Benchmarking strategy '{}'", strategy);
        info!("Command: {}", command.command_line());

        let mut result = match self.start(launch, &command, &mut guard).await {
            Err(e) => {
                error!("{}", e);
                advance(&mut machine, RunPhase::ProcessError, Some(e.to_string()));
                let mut result = RunResult::process_error(strategy.clone(), e.to_string());
                result.started_at = started_at;
                result
            }
            Ok(started) => {
                advance(&mut machine, RunPhase::Polling, None);
                info!("Waiting for health endpoint at {}...", endpoint.health_url);

                let outcome = self.wait_until_ready(&mut guard, &endpoint, started, ready_timeout).await;
                self.settle(&mut machine, &strategy, started_at, outcome, ready_timeout)
            }
        };

        advance(&mut machine, RunPhase::TearingDown, None);
        result.teardown = guard
            .release(self.config.graceful_timeout, self.config.force_kill_timeout)
            .await;
        advance(&mut machine, RunPhase::Done, Some(result.teardown.to_string()));

        (result, machine)
    }

    /// Preflight and spawn. On success the guard owns the process and the
    /// returned instant marks the start of the measurement.
    async fn start(
        &self,
        launch: &LaunchConfig,
        command: &loadbench_process::LaunchCommand,
        guard: &mut ProcessGuard,
    ) -> Result<Instant, BenchError> {
        if self.config.preflight_port_check
            && port_accepts_connections(&self.config.probe_host, launch.port, self.config.probe_timeout).await
        {
            return Err(BenchError::PortInUse { port: launch.port });
        }

        let process = self
            .launcher
            .launch(command)
            .map_err(|e| BenchError::launch_failure(launch.strategy.as_str(), e.to_string()))?;
        let started = Instant::now();

        *guard = ProcessGuard::new(launch.strategy.clone(), process);
        Ok(started)
    }

    /// Poll at a fixed interval until the first success, the process dies,
    /// shutdown is requested, or `ready_timeout` has elapsed since `started`.
    /// First success wins.
    async fn wait_until_ready(
        &self,
        guard: &mut ProcessGuard,
        endpoint: &ReadinessEndpoint,
        started: Instant,
        ready_timeout: Duration,
    ) -> PollOutcome {
        let mut polls = 0u32;
        let mut shutdown = self.shutdown.clone();

        while started.elapsed() < ready_timeout {
            let outcome = tokio::select! {
                biased;
                _ = shutdown_signalled(&mut shutdown) => return PollOutcome::Interrupted { polls },
                outcome = self.probe.check(endpoint) => outcome,
            };
            polls += 1;

            match outcome {
                ProbeOutcome::Ready { status } => {
                    let elapsed = started.elapsed();
                    debug!("Poll #{} ready (status {})", polls, status);
                    return PollOutcome::Ready { elapsed, polls };
                }
                ProbeOutcome::NotReady(reason) => {
                    debug!("Poll #{} not ready: {}", polls, reason);
                }
            }

            if let Some(status) = guard.exit_status() {
                return PollOutcome::ExitedEarly { status, polls };
            }

            tokio::select! {
                biased;
                _ = shutdown_signalled(&mut shutdown) => return PollOutcome::Interrupted { polls },
                _ = sleep(self.config.poll_interval) => {}
            }
        }

        PollOutcome::TimedOut { polls }
    }

    fn settle(
        &self,
        machine: &mut RunStateMachine,
        strategy: &StrategyId,
        started_at: DateTime<Utc>,
        outcome: PollOutcome,
        ready_timeout: Duration,
    ) -> RunResult {
        let (mut result, polls) = match outcome {
            PollOutcome::Ready { elapsed, polls } => {
                let secs = elapsed.as_secs_f64();
                info!("✓ Ready after {:.2}s", secs);
                advance(machine, RunPhase::Ready, Some(format!("{} polls", polls)));
                (RunResult::ready(strategy.clone(), secs), polls)
            }
            PollOutcome::TimedOut { polls } => {
                let e = BenchError::readiness_timeout(strategy.as_str(), ready_timeout);
                warn!("✗ {}", e);
                advance(machine, RunPhase::TimedOut, Some(e.to_string()));
                let mut result = RunResult::timed_out(strategy.clone());
                result.detail = Some(e.to_string());
                (result, polls)
            }
            PollOutcome::ExitedEarly { status, polls } => {
                let e = BenchError::exited_early(strategy.as_str(), status);
                error!("✗ {}", e);
                advance(machine, RunPhase::ProcessError, Some(e.to_string()));
                (RunResult::process_error(strategy.clone(), e.to_string()), polls)
            }
            // No outcome phase: Polling goes straight to TearingDown.
            PollOutcome::Interrupted { polls } => {
                warn!("✗ Strategy '{}': {} after {} polls", strategy, BenchError::Interrupted, polls);
                let mut result = RunResult::timed_out(strategy.clone());
                result.detail = Some(format!("{} after {} polls", BenchError::Interrupted, polls));
                (result, polls)
            }
        };

        result.started_at = started_at;
        result.polls = polls;
        result
    }
}

/// Phase changes follow a fixed script above; a rejected one is a bug worth
/// logging but never worth failing the run over.
fn advance(machine: &mut RunStateMachine, phase: RunPhase, reason: Option<String>) {
    if let Err(e) = machine.transition_to(phase, reason) {
        error!("{}", e);
    }
}

/// Resolves once shutdown is requested; never without a receiver or once
/// the sender is gone.
async fn shutdown_signalled(shutdown: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = shutdown {
        if rx.wait_for(|stop| *stop).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}
