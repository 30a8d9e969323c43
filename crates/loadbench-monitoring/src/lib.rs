//! # Loadbench Monitoring
//!
//! Readiness probing for the benchmark harness.
//!
//! This crate provides:
//! - The [`ReadinessProbe`] seam the runner polls through
//! - An HTTP implementation built on hyper ([`HttpReadinessProbe`])
//! - An optional model-identity check against `/v1/models`
//! - A port-occupancy preflight

pub mod http;
pub mod model_identity;
pub mod preflight;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What to probe for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessEndpoint {
    /// Full health URL, e.g. `http://localhost:8001/health`.
    pub health_url: String,
    /// Full model-listing URL, e.g. `http://localhost:8001/v1/models`.
    pub models_url: String,
    /// When set, a health success only counts if this model is served.
    pub expected_model: Option<String>,
}

impl ReadinessEndpoint {
    pub fn new(host: &str, port: u16, health_path: &str) -> Self {
        let base = format!("http://{}:{}", host, port);
        Self {
            health_url: format!("{}{}", base, health_path),
            models_url: format!("{}/v1/models", base),
            expected_model: None,
        }
    }

    pub fn with_expected_model(mut self, model: impl Into<String>) -> Self {
        self.expected_model = Some(model.into());
        self
    }
}

/// Why a single probe did not report ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotReadyReason {
    /// Connection refused or reset. The server is not listening yet.
    ConnectionFailed(String),
    /// The request did not complete within the per-request timeout.
    Timeout,
    /// The endpoint answered with a non-2xx status.
    Status(u16),
    /// The server is up but serves a different model.
    ModelMismatch { expected: String, served: Vec<String> },
    /// The model listing could not be parsed.
    InvalidResponse(String),
    /// The request could not even be built.
    InvalidRequest(String),
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReadyReason::ConnectionFailed(e) => write!(f, "connection failed: {}", e),
            NotReadyReason::Timeout => write!(f, "request timed out"),
            NotReadyReason::Status(code) => write!(f, "unexpected status {}", code),
            NotReadyReason::ModelMismatch { expected, served } => {
                write!(f, "model mismatch: expected '{}', served {:?}", expected, served)
            }
            NotReadyReason::InvalidResponse(e) => write!(f, "invalid response: {}", e),
            NotReadyReason::InvalidRequest(e) => write!(f, "invalid request: {}", e),
        }
    }
}

/// Result of one readiness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ready { status: u16 },
    NotReady(NotReadyReason),
}

impl ProbeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeOutcome::Ready { .. })
    }
}

/// A single readiness check against a spawned server.
///
/// Implementations must never fail hard: every problem is a
/// [`ProbeOutcome::NotReady`] so that the caller simply polls again.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn check(&self, endpoint: &ReadinessEndpoint) -> ProbeOutcome;
}

// Re-export main types
pub use http::*;
pub use model_identity::*;
pub use preflight::*;
