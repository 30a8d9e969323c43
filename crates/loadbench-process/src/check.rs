//! Process existence checking.

use loadbench_common::ProcessResult;

/// Check if a process with the given PID exists and is running.
///
/// On Unix this sends no signal but uses `kill(pid, 0)` to ask the kernel
/// whether the PID is alive. A zombie that has not been reaped still counts
/// as existing, so callers holding a `Child` should prefer waiting on it and
/// only fall back to this check when the wait itself failed.
///
/// # Returns
///
/// * `Ok(true)` - Process exists
/// * `Ok(false)` - Process does not exist
/// * `Err(_)` - The check itself failed
pub fn process_exists(pid: u32) -> ProcessResult<bool> {
    #[cfg(unix)]
    {
        process_exists_unix(pid)
    }

    #[cfg(not(unix))]
    {
        Err(loadbench_common::ProcessError::check_failed(
            pid.to_string(),
            "process existence check is not supported on this platform",
        ))
    }
}

#[cfg(unix)]
fn process_exists_unix(pid: u32) -> ProcessResult<bool> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let nix_pid = Pid::from_raw(pid as i32);

    match kill(nix_pid, None) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        // Exists, but owned by someone else
        Err(nix::errno::Errno::EPERM) => Ok(true),
        Err(e) => Err(loadbench_common::ProcessError::check_failed(
            pid.to_string(),
            format!("Failed to check process: {}", e),
        )),
    }
}
