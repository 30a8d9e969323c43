//! Process termination primitives.

use loadbench_common::{ProcessError, ProcessResult};

/// Ask a process to shut down (SIGTERM on Unix).
pub fn terminate_gracefully(pid: u32) -> ProcessResult<()> {
    #[cfg(unix)]
    {
        send_signal(pid, nix::sys::signal::Signal::SIGTERM)
    }

    #[cfg(not(unix))]
    {
        Err(ProcessError::stop_failed(
            pid.to_string(),
            "graceful termination is not supported on this platform",
        ))
    }
}

/// Force kill a process (SIGKILL on Unix).
pub fn force_kill(pid: u32) -> ProcessResult<()> {
    #[cfg(unix)]
    {
        send_signal(pid, nix::sys::signal::Signal::SIGKILL)
    }

    #[cfg(not(unix))]
    {
        Err(ProcessError::stop_failed(
            pid.to_string(),
            "force kill by PID is not supported on this platform",
        ))
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> ProcessResult<()> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), signal)
        .map_err(|e| ProcessError::stop_failed(pid.to_string(), format!("{}: {}", signal, e)))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_terminate_stops_sleeping_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        terminate_gracefully(child.id()).unwrap();

        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_force_kill_stops_child_ignoring_sigterm() {
        let mut child = Command::new("sh")
            .args(["-c", "trap '' TERM; sleep 30"])
            .spawn()
            .unwrap();
        force_kill(child.id()).unwrap();

        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_signal_to_missing_process_fails() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        let err = terminate_gracefully(pid).unwrap_err();
        assert!(matches!(err, ProcessError::StopFailed { .. }));
    }
}
