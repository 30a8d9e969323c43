//! Launch configuration and command rendering.
//!
//! A [`LaunchConfig`] describes *what* to benchmark: a strategy, a model
//! source, a port and strategy-specific options. A [`ServerCommand`] knows
//! *how* the serving binary is invoked and renders a config into the argument
//! list the process layer spawns.

use loadbench_common::{BenchError, BenchResult, StrategyId};
use loadbench_process::LaunchCommand;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Strategy name of the plain loader used as the baseline.
pub const STANDARD_STRATEGY: &str = "standard";

/// Strategy name of the streaming loader used as the candidate.
pub const STREAMER_STRATEGY: &str = "accelerated-streamer";

pub const DEFAULT_BASELINE_PORT: u16 = 8001;
pub const DEFAULT_CANDIDATE_PORT: u16 = 8002;
pub const DEFAULT_CONCURRENCY: u64 = 32;

/// Streamer CPU buffer limit: 5 GiB.
pub const DEFAULT_MEMORY_LIMIT_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Options that are bundled into a single `--model-loader-extra-config`
/// JSON argument instead of being passed as individual flags.
pub const LOADER_EXTRA_KEYS: &[&str] = &["concurrency", "memory_limit"];

/// One loading strategy to benchmark. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchConfig {
    pub strategy: StrategyId,
    pub model_source: String,
    pub port: u16,
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

impl LaunchConfig {
    pub fn new(strategy: impl Into<StrategyId>, model_source: impl Into<String>, port: u16) -> Self {
        Self {
            strategy: strategy.into(),
            model_source: model_source.into(),
            port,
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Overlay `options` on top of the existing ones. `null` removes a key.
    pub fn with_options(mut self, options: &BTreeMap<String, Value>) -> Self {
        for (key, value) in options {
            if value.is_null() {
                self.options.remove(key);
            } else {
                self.options.insert(key.clone(), value.clone());
            }
        }
        self
    }

    /// Plain loading at 90% GPU memory utilization.
    pub fn standard(model_source: impl Into<String>, port: u16) -> Self {
        Self::new(STANDARD_STRATEGY, model_source, port).with_option("gpu-memory-utilization", 0.9)
    }

    /// Streaming loader with `concurrency` reader threads, bf16 weights and
    /// 95% GPU memory utilization.
    pub fn accelerated_streamer(model_source: impl Into<String>, port: u16, concurrency: u64) -> Self {
        Self::new(STREAMER_STRATEGY, model_source, port)
            .with_option("load-format", "runai_streamer")
            .with_option("concurrency", concurrency)
            .with_option("memory_limit", DEFAULT_MEMORY_LIMIT_BYTES)
            .with_option("gpu-memory-utilization", 0.95)
            .with_option("dtype", "bfloat16")
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn concurrency(&self) -> Option<u64> {
        self.option("concurrency").and_then(Value::as_u64)
    }

    pub fn validate(&self) -> BenchResult<()> {
        if self.strategy.as_str().trim().is_empty() {
            return Err(BenchError::configuration("Strategy identifier cannot be empty"));
        }

        if self.model_source.trim().is_empty() {
            return Err(BenchError::configuration(format!(
                "Model source cannot be empty (strategy '{}')",
                self.strategy
            )));
        }

        if self.port == 0 {
            return Err(BenchError::configuration(format!(
                "Port must be between 1 and 65535 (strategy '{}')",
                self.strategy
            )));
        }

        if let Some(value) = self.option("concurrency") {
            if value.as_u64().map_or(true, |c| c == 0) {
                return Err(BenchError::configuration(format!(
                    "Concurrency must be a positive integer, got {} (strategy '{}')",
                    value, self.strategy
                )));
            }
        }

        Ok(())
    }
}

/// How the model server binary is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCommand {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_base_args")]
    pub base_args: Vec<String>,
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for ServerCommand {
    fn default() -> Self {
        Self {
            program: default_program(),
            base_args: default_base_args(),
            bind_host: default_bind_host(),
            env: BTreeMap::new(),
        }
    }
}

impl ServerCommand {
    /// Render `config` into a concrete argument list.
    ///
    /// Layout: `program base_args --model <src> --host <bind> --port <port>`
    /// followed by the options in key order, then the bundled loader config.
    pub fn render(&self, config: &LaunchConfig) -> LaunchCommand {
        let mut command = LaunchCommand::new(&self.program)
            .args(self.base_args.iter().cloned())
            .args([
                "--model".to_string(),
                config.model_source.clone(),
                "--host".to_string(),
                self.bind_host.clone(),
                "--port".to_string(),
                config.port.to_string(),
            ]);

        let mut loader_extra = serde_json::Map::new();

        for (key, value) in &config.options {
            if LOADER_EXTRA_KEYS.contains(&key.as_str()) {
                loader_extra.insert(key.clone(), value.clone());
                continue;
            }

            let flag = format!("--{}", key);
            match value {
                Value::Null | Value::Bool(false) => {}
                Value::Bool(true) => command = command.arg(flag),
                Value::String(s) => command = command.arg(flag).arg(s.clone()),
                other => command = command.arg(flag).arg(other.to_string()),
            }
        }

        if !loader_extra.is_empty() {
            command = command
                .arg("--model-loader-extra-config")
                .arg(Value::Object(loader_extra).to_string());
        }

        for (key, value) in &self.env {
            command = command.env(key.clone(), value.clone());
        }

        command
    }
}

fn default_program() -> String {
    "python".to_string()
}

fn default_base_args() -> Vec<String> {
    vec!["-m".to_string(), "vllm.entrypoints.openai.api_server".to_string()]
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}
