use crate::launch::{
    LaunchConfig, ServerCommand, DEFAULT_BASELINE_PORT, DEFAULT_CANDIDATE_PORT, DEFAULT_CONCURRENCY,
};
use anyhow::{Context, Result};
use loadbench_process::OutputMode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub mod validation;

/// Candidates loading faster than this pass the benchmark.
pub const DEFAULT_ACCEPTANCE_THRESHOLD: Duration = Duration::from_secs(30);

pub const DEFAULT_LAUNCHES_PER_DAY: u32 = 100;

/// Per-run timing and probing settings.
///
/// These used to be process-wide constants; keeping them on a value lets
/// several runners coexist in one process without interfering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Host the readiness probe connects to.
    #[serde(default = "default_probe_host")]
    pub probe_host: String,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,
    #[serde(default = "default_ready_timeout", with = "duration_serde")]
    pub ready_timeout: Duration,
    #[serde(default = "default_graceful_timeout", with = "duration_serde")]
    pub graceful_timeout: Duration,
    #[serde(default = "default_force_kill_timeout", with = "duration_serde")]
    pub force_kill_timeout: Duration,
    /// Refuse to spawn when something already answers on the port.
    #[serde(default = "default_true")]
    pub preflight_port_check: bool,
    /// Require `/v1/models` to list the expected model before counting ready.
    #[serde(default)]
    pub verify_model: bool,
    /// Model id to expect when `verify_model` is on. Defaults to the model source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_model: Option<String>,
    #[serde(default)]
    pub server_output: OutputMode,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            probe_host: default_probe_host(),
            health_path: default_health_path(),
            poll_interval: default_poll_interval(),
            probe_timeout: default_probe_timeout(),
            ready_timeout: default_ready_timeout(),
            graceful_timeout: default_graceful_timeout(),
            force_kill_timeout: default_force_kill_timeout(),
            preflight_port_check: true,
            verify_model: false,
            expected_model: None,
            server_output: OutputMode::default(),
        }
    }
}

/// Per-strategy overrides layered onto the built-in presets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Extra or replacement options. A `null` value removes a preset option.
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

/// Top-level benchmark configuration, loadable from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    #[serde(default)]
    pub server: ServerCommand,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub baseline: StrategyOverrides,
    #[serde(default)]
    pub candidate: StrategyOverrides,
    #[serde(default = "default_concurrency")]
    pub concurrency: u64,
    #[serde(default)]
    pub skip_baseline: bool,
    #[serde(default = "default_launches_per_day")]
    pub launches_per_day: u32,
    #[serde(default = "default_acceptance_threshold", with = "duration_serde")]
    pub acceptance_threshold: Duration,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            server: ServerCommand::default(),
            runner: RunnerConfig::default(),
            baseline: StrategyOverrides::default(),
            candidate: StrategyOverrides::default(),
            concurrency: default_concurrency(),
            skip_baseline: false,
            launches_per_day: default_launches_per_day(),
            acceptance_threshold: default_acceptance_threshold(),
        }
    }
}

impl BenchmarkConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: BenchmarkConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    pub fn baseline_launch(&self, model_source: &str) -> LaunchConfig {
        LaunchConfig::standard(model_source, self.baseline.port.unwrap_or(DEFAULT_BASELINE_PORT))
            .with_options(&self.baseline.options)
    }

    pub fn candidate_launch(&self, model_source: &str) -> LaunchConfig {
        LaunchConfig::accelerated_streamer(
            model_source,
            self.candidate.port.unwrap_or(DEFAULT_CANDIDATE_PORT),
            self.concurrency,
        )
        .with_options(&self.candidate.options)
    }
}

// Default value functions
fn default_probe_host() -> String {
    "localhost".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_ready_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_graceful_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_force_kill_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> u64 {
    DEFAULT_CONCURRENCY
}

fn default_launches_per_day() -> u32 {
    DEFAULT_LAUNCHES_PER_DAY
}

fn default_acceptance_threshold() -> Duration {
    DEFAULT_ACCEPTANCE_THRESHOLD
}

// Custom serialization for Duration
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        // Check for "ms" BEFORE "s" since "ms" ends with 's'
        if let Some(num_str) = s.strip_suffix("ms") {
            let millis: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_millis(millis))
        } else if let Some(num_str) = s.strip_suffix('s') {
            let secs: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else if let Some(num_str) = s.strip_suffix('m') {
            let mins: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            let secs = mins.checked_mul(60).ok_or_else(|| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}
