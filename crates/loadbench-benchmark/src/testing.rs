//! In-memory launcher, process and probe doubles for unit tests.

use crate::process::{ServerLauncher, ServerProcess};
use async_trait::async_trait;
use loadbench_common::{ProcessError, ProcessResult, TeardownOutcome};
use loadbench_monitoring::{NotReadyReason, ProbeOutcome, ReadinessEndpoint, ReadinessProbe};
use loadbench_process::LaunchCommand;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Probe that turns ready on the Nth check of a given port.
/// Ports without a script never become ready.
#[derive(Default)]
pub struct ScriptedProbe {
    ready_on: HashMap<u16, u32>,
    calls: Arc<Mutex<HashMap<u16, u32>>>,
}

impl ScriptedProbe {
    pub fn ready_on(mut self, port: u16, nth_call: u32) -> Self {
        self.ready_on.insert(port, nth_call);
        self
    }

    pub fn calls(&self) -> Arc<Mutex<HashMap<u16, u32>>> {
        self.calls.clone()
    }
}

fn port_of(url: &str) -> u16 {
    url.trim_start_matches("http://")
        .split('/')
        .next()
        .and_then(|authority| authority.rsplit(':').next())
        .and_then(|port| port.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl ReadinessProbe for ScriptedProbe {
    async fn check(&self, endpoint: &ReadinessEndpoint) -> ProbeOutcome {
        let port = port_of(&endpoint.health_url);
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(port).or_insert(0);
            *count += 1;
            *count
        };

        match self.ready_on.get(&port) {
            Some(&n) if call >= n => ProbeOutcome::Ready { status: 200 },
            _ => ProbeOutcome::NotReady(NotReadyReason::ConnectionFailed("Connection refused".to_string())),
        }
    }
}

pub struct FakeProcess {
    teardowns: Arc<AtomicU32>,
    exits_after_checks: Option<u32>,
    checks: u32,
}

#[async_trait]
impl ServerProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(31337)
    }

    fn exit_status(&mut self) -> Option<String> {
        self.checks += 1;
        match self.exits_after_checks {
            Some(n) if self.checks >= n => Some("exit status: 1".to_string()),
            _ => None,
        }
    }

    async fn terminate(&mut self, _graceful: Duration, _force_wait: Duration) -> TeardownOutcome {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        TeardownOutcome::Graceful
    }

    fn kill_now(&mut self) {}
}

/// Launcher recording every command. Commands binding a port listed in
/// `fail_ports` fail to spawn.
#[derive(Default)]
pub struct FakeLauncher {
    pub fail_ports: Vec<u16>,
    pub exits_after_checks: Option<u32>,
    pub teardowns: Arc<AtomicU32>,
    pub launched: Arc<Mutex<Vec<LaunchCommand>>>,
}

impl FakeLauncher {
    fn port_of(command: &LaunchCommand) -> Option<u16> {
        command
            .args
            .iter()
            .position(|a| a == "--port")
            .and_then(|i| command.args.get(i + 1))
            .and_then(|p| p.parse().ok())
    }
}

impl ServerLauncher for FakeLauncher {
    fn launch(&self, command: &LaunchCommand) -> ProcessResult<Box<dyn ServerProcess>> {
        self.launched.lock().unwrap().push(command.clone());

        if Self::port_of(command).map_or(false, |p| self.fail_ports.contains(&p)) {
            return Err(ProcessError::spawn_failed(&command.program, "No such file or directory"));
        }

        Ok(Box::new(FakeProcess {
            teardowns: self.teardowns.clone(),
            exits_after_checks: self.exits_after_checks,
            checks: 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_parsing() {
        assert_eq!(port_of("http://localhost:8001/health"), 8001);
        assert_eq!(port_of("http://127.0.0.1:9/v1/models"), 9);
    }
}
