//! Managed server processes and their scoped teardown.
//!
//! The runner never holds a raw child handle. It holds a [`ProcessGuard`],
//! and every exit path either releases the guard explicitly (graceful signal,
//! bounded wait, forced kill) or drops it, which force-kills synchronously.

use async_trait::async_trait;
use loadbench_common::{BenchError, ProcessResult, StrategyId, TeardownOutcome};
use loadbench_process::{force_kill, process_exists, spawn_command, terminate_gracefully, LaunchCommand, OutputMode};
use std::time::Duration;
use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// A running server the runner can observe and stop.
#[async_trait]
pub trait ServerProcess: Send {
    fn pid(&self) -> Option<u32>;

    /// Exit status description if the process has already exited on its own.
    fn exit_status(&mut self) -> Option<String>;

    /// Graceful signal, wait up to `graceful`, then force-kill and wait up
    /// to `force_wait`. Never fails: problems are reported in the outcome.
    async fn terminate(&mut self, graceful: Duration, force_wait: Duration) -> TeardownOutcome;

    /// Immediate best-effort kill, safe to call from `Drop`.
    fn kill_now(&mut self);
}

/// Starts server processes from rendered launch commands.
pub trait ServerLauncher: Send + Sync {
    fn launch(&self, command: &LaunchCommand) -> ProcessResult<Box<dyn ServerProcess>>;
}

/// Launches real child processes on the local machine.
#[derive(Debug, Clone, Default)]
pub struct LocalLauncher {
    output: OutputMode,
}

impl LocalLauncher {
    pub fn new(output: OutputMode) -> Self {
        Self { output }
    }
}

impl ServerLauncher for LocalLauncher {
    fn launch(&self, command: &LaunchCommand) -> ProcessResult<Box<dyn ServerProcess>> {
        let child = spawn_command(command, self.output)?;
        Ok(Box::new(ChildServer::new(child)))
    }
}

/// A server backed by a tokio child process.
///
/// Signals are sent by PID. This is safe while the `Child` is held and not
/// yet waited on: an unreaped child keeps its PID reserved.
pub struct ChildServer {
    child: Child,
    pid: Option<u32>,
}

impl ChildServer {
    pub fn new(child: Child) -> Self {
        let pid = child.id();
        Self { child, pid }
    }

    /// Wait for exit, bounded. `Ok(true)` once the child is confirmed gone.
    async fn wait_for_exit(&mut self, pid: u32, bound: Duration) -> Result<bool, String> {
        match timeout(bound, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("PID {} exited: {}", pid, status);
                Ok(true)
            }
            Ok(Err(e)) => {
                warn!("Waiting on PID {} failed: {}", pid, e);
                // Fall back to asking the kernel directly
                process_exists(pid).map(|exists| !exists).map_err(|e| e.to_string())
            }
            Err(_) => Ok(false),
        }
    }
}

#[async_trait]
impl ServerProcess for ChildServer {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn exit_status(&mut self) -> Option<String> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.to_string()),
            Ok(None) => None,
            Err(e) => {
                debug!("try_wait failed for PID {:?}: {}", self.pid, e);
                None
            }
        }
    }

    async fn terminate(&mut self, graceful: Duration, force_wait: Duration) -> TeardownOutcome {
        let pid = match self.pid {
            Some(pid) => pid,
            None => return TeardownOutcome::NotNeeded,
        };

        if let Some(status) = self.exit_status() {
            debug!("PID {} already exited before teardown: {}", pid, status);
            return TeardownOutcome::Graceful;
        }

        info!("Sending termination signal to PID {}", pid);
        if let Err(e) = terminate_gracefully(pid) {
            warn!("Failed to send graceful termination to PID {}: {}", pid, e);
        }

        match self.wait_for_exit(pid, graceful).await {
            Ok(true) => {
                info!("Process terminated gracefully (PID: {})", pid);
                return TeardownOutcome::Graceful;
            }
            Ok(false) => {
                warn!(
                    "Graceful shutdown timed out after {:?} (PID: {}), attempting force kill",
                    graceful, pid
                );
            }
            Err(e) => warn!("Could not confirm exit of PID {}: {}", pid, e),
        }

        if let Err(e) = force_kill(pid) {
            error!("Force kill failed for PID {}: {}", pid, e);
            if let Err(e) = self.child.start_kill() {
                error!("Fallback kill failed for PID {}: {}", pid, e);
            }
        }

        match self.wait_for_exit(pid, force_wait).await {
            Ok(true) => {
                info!("Process terminated after force kill (PID: {})", pid);
                TeardownOutcome::Forced
            }
            Ok(false) => TeardownOutcome::Failed(format!(
                "did not exit after graceful timeout {:?} + force-kill timeout {:?}",
                graceful, force_wait
            )),
            Err(e) => TeardownOutcome::Failed(e),
        }
    }

    fn kill_now(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("Immediate kill of PID {:?} failed: {}", self.pid, e);
        }
    }
}

/// Scoped ownership of at most one server process.
///
/// [`release`](ProcessGuard::release) performs the full teardown and can run
/// only once since it consumes the guard. A guard dropped without release
/// (interrupt, cancelled future) kills the process immediately.
pub struct ProcessGuard {
    strategy: StrategyId,
    process: Option<Box<dyn ServerProcess>>,
}

impl ProcessGuard {
    pub fn new(strategy: StrategyId, process: Box<dyn ServerProcess>) -> Self {
        Self {
            strategy,
            process: Some(process),
        }
    }

    /// A guard over nothing, for runs where no process was started.
    pub fn empty(strategy: StrategyId) -> Self {
        Self {
            strategy,
            process: None,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.pid())
    }

    /// Exit status if the guarded process died on its own.
    pub fn exit_status(&mut self) -> Option<String> {
        self.process.as_mut().and_then(|p| p.exit_status())
    }

    pub async fn release(mut self, graceful: Duration, force_wait: Duration) -> TeardownOutcome {
        let pid = self.pid();
        let outcome = match self.process.take() {
            Some(mut process) => process.terminate(graceful, force_wait).await,
            None => TeardownOutcome::NotNeeded,
        };

        // Swallowed: a cleanup problem must not change the measured result.
        if let TeardownOutcome::Failed(reason) = &outcome {
            match pid {
                Some(pid) => error!(
                    "Strategy '{}': {}",
                    self.strategy,
                    BenchError::teardown_failure(pid, reason.clone())
                ),
                None => error!("Teardown failed for strategy '{}': {}", self.strategy, reason),
            }
        }

        outcome
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            warn!(
                "Server for strategy '{}' (PID: {:?}) dropped without teardown, killing",
                self.strategy,
                process.pid()
            );
            process.kill_now();
        }
    }
}
