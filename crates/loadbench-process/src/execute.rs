//! Process spawning.
//!
//! A server launch is represented as an argument list plus environment
//! ([`LaunchCommand`]). Spawning never pipes the child's output: an unread
//! pipe can fill up and stall a chatty server mid-load, which would distort
//! the measurement.

use loadbench_common::{ProcessError, ProcessResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// A fully rendered launch: program, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Space-joined command line, for display only.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Where the child's stdout/stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    Discard,
    Inherit,
}

impl OutputMode {
    fn stdio(self) -> Stdio {
        match self {
            OutputMode::Discard => Stdio::null(),
            OutputMode::Inherit => Stdio::inherit(),
        }
    }
}

/// Spawn the command as a child process.
///
/// The child is marked kill-on-drop so that an abandoned handle never
/// leaves a server holding the port and GPU memory.
pub fn spawn_command(command: &LaunchCommand, output: OutputMode) -> ProcessResult<Child> {
    debug!("Spawning: {}", command.command_line());

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .envs(&command.env)
        .stdin(Stdio::null())
        .stdout(output.stdio())
        .stderr(output.stdio())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| ProcessError::spawn_failed(&command.program, e.to_string()))?;

    info!(
        "Process spawned successfully: {} (PID: {})",
        command.program,
        child.id().unwrap_or(0)
    );
    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_rendering() {
        let command = LaunchCommand::new("python")
            .args(["-m", "vllm.entrypoints.openai.api_server"])
            .arg("--port")
            .arg("8001")
            .env("HF_HOME", "/tmp/hf");

        assert_eq!(
            command.command_line(),
            "python -m vllm.entrypoints.openai.api_server --port 8001"
        );
        assert_eq!(command.env.get("HF_HOME").map(String::as_str), Some("/tmp/hf"));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let command = LaunchCommand::new("/definitely/not/a/real/binary");
        let err = spawn_command(&command, OutputMode::Discard).unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_passes_environment() {
        let command = LaunchCommand::new("sh")
            .args(["-c", "test \"$LOADBENCH_PROBE\" = yes"])
            .env("LOADBENCH_PROBE", "yes");

        let mut child = spawn_command(&command, OutputMode::Discard).unwrap();
        let status = child.wait().await.unwrap();
        assert!(status.success());
    }
}
