//! One benchmark session: the baseline (unless skipped), then the candidate.

use crate::config::BenchmarkConfig;
use crate::launch::{LaunchConfig, DEFAULT_CONCURRENCY};
use crate::report::BenchmarkSummary;
use crate::runner::{BenchmarkRunner, RunResult};
use loadbench_common::{BenchError, BenchResult};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// What a session will run, fully resolved before anything is spawned.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkPlan {
    pub model_source: String,
    pub baseline: Option<LaunchConfig>,
    pub candidate: LaunchConfig,
    pub ready_timeout: Duration,
    pub launches_per_day: u32,
}

impl BenchmarkPlan {
    pub fn from_config(config: &BenchmarkConfig, model_source: &str) -> Self {
        Self {
            model_source: model_source.to_string(),
            baseline: (!config.skip_baseline).then(|| config.baseline_launch(model_source)),
            candidate: config.candidate_launch(model_source),
            ready_timeout: config.runner.ready_timeout,
            launches_per_day: config.launches_per_day,
        }
    }

    /// Check every launch before any process starts.
    pub fn validate(&self) -> BenchResult<()> {
        if self.ready_timeout.is_zero() {
            return Err(BenchError::configuration("Ready timeout must be greater than 0"));
        }

        if let Some(baseline) = &self.baseline {
            baseline.validate()?;
            if baseline.port == self.candidate.port {
                return Err(BenchError::configuration(format!(
                    "Baseline and candidate share port {}",
                    baseline.port
                )));
            }
        }

        self.candidate.validate()
    }

    fn concurrency(&self) -> u64 {
        self.candidate.concurrency().unwrap_or(DEFAULT_CONCURRENCY)
    }
}

pub struct BenchmarkSession {
    runner: BenchmarkRunner,
    plan: BenchmarkPlan,
}

impl BenchmarkSession {
    pub fn new(runner: BenchmarkRunner, plan: BenchmarkPlan) -> Self {
        Self { runner, plan }
    }

    /// Session with a local launcher and an HTTP probe.
    pub fn from_config(config: &BenchmarkConfig, model_source: &str) -> Self {
        let runner = BenchmarkRunner::new(config.runner.clone(), config.server.clone());
        Self::new(runner, BenchmarkPlan::from_config(config, model_source))
    }

    /// Forward `shutdown` to the runner. The run in progress stops its
    /// server gracefully and no further run starts.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.runner = self.runner.with_shutdown(shutdown);
        self
    }

    /// Run the plan sequentially. Only a configuration error or an
    /// interrupt is returned; every per-run failure is recorded on the
    /// summary.
    pub async fn run(&self) -> BenchResult<BenchmarkSummary> {
        self.plan.validate()?;

        info!("Model: {}", self.plan.model_source);

        let baseline = match &self.plan.baseline {
            Some(launch) => {
                let result = self.runner.run_one(launch, self.plan.ready_timeout).await;
                self.check_interrupted()?;
                if !result.is_ready() {
                    warn!(
                        "Baseline '{}' did not become ready ({}), continuing with candidate",
                        result.strategy, result.status
                    );
                }
                Some(result)
            }
            None => {
                info!("Skipping baseline run");
                None
            }
        };

        let candidate: RunResult = self
            .runner
            .run_one(&self.plan.candidate, self.plan.ready_timeout)
            .await;
        self.check_interrupted()?;

        Ok(BenchmarkSummary::new(
            self.plan.model_source.clone(),
            self.plan.concurrency(),
            baseline,
            candidate,
            self.plan.launches_per_day,
        ))
    }

    fn check_interrupted(&self) -> BenchResult<()> {
        if self.runner.shutdown_requested() {
            return Err(BenchError::Interrupted);
        }
        Ok(())
    }
}
