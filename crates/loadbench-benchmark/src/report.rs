//! Comparison of two runs and the human-readable summary.

use crate::config::DEFAULT_LAUNCHES_PER_DAY;
use crate::runner::RunResult;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

/// Working days per month used when projecting daily savings.
const WORKING_DAYS_PER_MONTH: f64 = 30.0;

/// Projected savings if every launch used the faster strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extrapolation {
    pub launches_per_day: u32,
    pub saved_minutes_per_day: f64,
    pub saved_hours_per_month: f64,
}

impl Extrapolation {
    pub fn from_saving(time_saved_secs: f64, launches_per_day: u32) -> Self {
        let daily_secs = time_saved_secs * launches_per_day as f64;
        Self {
            launches_per_day,
            saved_minutes_per_day: daily_secs / 60.0,
            saved_hours_per_month: daily_secs * WORKING_DAYS_PER_MONTH / 3600.0,
        }
    }
}

/// Derived comparison between a baseline run and a candidate run.
///
/// Numeric fields are present only when both runs are ready and the
/// candidate's elapsed time is positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub baseline: RunResult,
    pub candidate: RunResult,
    pub speedup: Option<f64>,
    pub time_saved_secs: Option<f64>,
    pub extrapolation: Option<Extrapolation>,
}

impl ComparisonReport {
    pub fn is_indeterminate(&self) -> bool {
        self.speedup.is_none()
    }
}

/// Compare `baseline` against `candidate` using the default launch volume.
pub fn compare(baseline: &RunResult, candidate: &RunResult) -> ComparisonReport {
    compare_with(baseline, candidate, DEFAULT_LAUNCHES_PER_DAY)
}

pub fn compare_with(baseline: &RunResult, candidate: &RunResult, launches_per_day: u32) -> ComparisonReport {
    let figures = match (baseline.elapsed(), candidate.elapsed()) {
        (Some(b), Some(c)) if baseline.is_ready() && candidate.is_ready() && c > 0.0 => Some((b / c, b - c)),
        _ => None,
    };

    ComparisonReport {
        baseline: baseline.clone(),
        candidate: candidate.clone(),
        speedup: figures.map(|(speedup, _)| speedup),
        time_saved_secs: figures.map(|(_, saved)| saved),
        extrapolation: figures.map(|(_, saved)| Extrapolation::from_saving(saved, launches_per_day)),
    }
}

/// Qualitative judgement of the candidate's load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum LoadVerdict {
    Excellent,
    Good,
    TryHigherConcurrency { suggested: u64 },
}

impl LoadVerdict {
    const EXCELLENT_BELOW_SECS: f64 = 10.0;
    const GOOD_BELOW_SECS: f64 = 20.0;

    pub fn classify(elapsed_secs: f64, concurrency: u64) -> Self {
        if elapsed_secs < Self::EXCELLENT_BELOW_SECS {
            LoadVerdict::Excellent
        } else if elapsed_secs < Self::GOOD_BELOW_SECS {
            LoadVerdict::Good
        } else {
            LoadVerdict::TryHigherConcurrency {
                suggested: concurrency.saturating_mul(2),
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            LoadVerdict::Excellent => "EXCELLENT: load time under 10 seconds".to_string(),
            LoadVerdict::Good => "GOOD: load time under 20 seconds".to_string(),
            LoadVerdict::TryHigherConcurrency { suggested } => {
                format!("Consider increasing concurrency to {}", suggested)
            }
        }
    }
}

/// Everything one session produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub model_source: String,
    pub concurrency: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<RunResult>,
    pub candidate: RunResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<LoadVerdict>,
}

impl BenchmarkSummary {
    pub fn new(
        model_source: impl Into<String>,
        concurrency: u64,
        baseline: Option<RunResult>,
        candidate: RunResult,
        launches_per_day: u32,
    ) -> Self {
        let comparison = baseline
            .as_ref()
            .map(|b| compare_with(b, &candidate, launches_per_day));
        let verdict = comparison
            .as_ref()
            .filter(|report| !report.is_indeterminate())
            .and_then(|report| report.candidate.elapsed())
            .map(|secs| LoadVerdict::classify(secs, concurrency));

        Self {
            model_source: model_source.into(),
            concurrency,
            baseline,
            candidate,
            comparison,
            verdict,
        }
    }

    /// The session passes when the candidate became ready strictly faster
    /// than `threshold`.
    pub fn accepted(&self, threshold: Duration) -> bool {
        self.candidate.is_ready()
            && self
                .candidate
                .elapsed()
                .map_or(false, |secs| secs < threshold.as_secs_f64())
    }

    pub fn render_text(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "BENCHMARK SUMMARY");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Model: {}", self.model_source);
        let _ = writeln!(out);

        if let Some(baseline) = &self.baseline {
            let _ = writeln!(out, "{}", render_run_line(baseline));
        }
        let _ = writeln!(
            out,
            "{} (concurrency={})",
            render_run_line(&self.candidate),
            self.concurrency
        );

        if let Some(report) = &self.comparison {
            let _ = writeln!(out);
            match (report.speedup, report.time_saved_secs) {
                (Some(speedup), Some(saved)) => {
                    let _ = writeln!(out, "Speedup:    {:.1}x faster", speedup);
                    let _ = writeln!(out, "Time saved: {:.1}s per model load", saved);
                    if let Some(ex) = &report.extrapolation {
                        let _ = writeln!(out);
                        let _ = writeln!(out, "With {} model loads/day:", ex.launches_per_day);
                        let _ = writeln!(out, "  Time saved: {:.1} minutes/day", ex.saved_minutes_per_day);
                        let _ = writeln!(out, "  Monthly:    {:.1} hours saved", ex.saved_hours_per_month);
                    }
                }
                _ => {
                    let _ = writeln!(out, "Comparison: indeterminate (both runs must be ready)");
                }
            }
        }

        if let Some(verdict) = &self.verdict {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", verdict.message());
        }

        let _ = writeln!(out, "{}", rule);
        out
    }
}

fn render_run_line(run: &RunResult) -> String {
    let label = format!("{}:", run.strategy);
    match run.elapsed() {
        Some(secs) if run.is_ready() => format!("{:<24}{:>8.1}s", label, secs),
        _ => match &run.detail {
            Some(detail) => format!("{:<24}{:>9} ({})", label, run.status.as_str(), detail),
            None => format!("{:<24}{:>9}", label, run.status.as_str()),
        },
    }
}
