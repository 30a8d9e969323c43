use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &BenchmarkConfig) -> Result<()> {
    validate_server_command(&config.server)?;
    validate_runner_config(&config.runner)?;

    if config.concurrency == 0 {
        return Err(anyhow!("Concurrency must be greater than 0"));
    }

    if config.launches_per_day == 0 {
        return Err(anyhow!("Launches per day must be greater than 0"));
    }

    if config.acceptance_threshold.is_zero() {
        return Err(anyhow!("Acceptance threshold must be greater than 0"));
    }

    for (name, overrides) in [("baseline", &config.baseline), ("candidate", &config.candidate)] {
        if overrides.port == Some(0) {
            return Err(anyhow!("{} port must be between 1 and 65535", name));
        }
    }

    if !config.skip_baseline {
        let baseline = config.baseline.port.unwrap_or(DEFAULT_BASELINE_PORT);
        let candidate = config.candidate.port.unwrap_or(DEFAULT_CANDIDATE_PORT);
        if baseline == candidate {
            return Err(anyhow!(
                "Baseline and candidate must use different ports, both are {}",
                baseline
            ));
        }
    }

    Ok(())
}

fn validate_server_command(server: &ServerCommand) -> Result<()> {
    if server.program.trim().is_empty() {
        return Err(anyhow!("Server program cannot be empty"));
    }

    if server.bind_host.trim().is_empty() {
        return Err(anyhow!("Server bind host cannot be empty"));
    }

    Ok(())
}

/// Validate runner timing and probe settings
pub fn validate_runner_config(runner: &RunnerConfig) -> Result<()> {
    if runner.ready_timeout.is_zero() {
        return Err(anyhow!("Ready timeout must be greater than 0"));
    }

    if runner.poll_interval.is_zero() {
        return Err(anyhow!("Poll interval must be greater than 0"));
    }

    if runner.poll_interval >= runner.ready_timeout {
        return Err(anyhow!(
            "Poll interval ({:?}) must be shorter than the ready timeout ({:?})",
            runner.poll_interval,
            runner.ready_timeout
        ));
    }

    if runner.probe_timeout.is_zero() {
        return Err(anyhow!("Probe timeout must be greater than 0"));
    }

    if runner.probe_host.trim().is_empty() {
        return Err(anyhow!("Probe host cannot be empty"));
    }

    if !runner.health_path.starts_with('/') {
        return Err(anyhow!(
            "Health path must start with '/', got: {}",
            runner.health_path
        ));
    }

    if let Some(expected) = &runner.expected_model {
        if expected.trim().is_empty() {
            return Err(anyhow!("Expected model cannot be empty when set"));
        }
    }

    Ok(())
}
