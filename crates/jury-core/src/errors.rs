//! Error types for the judging pipeline.
//!
//! Per-judge failures never escape the dispatcher (they become failure
//! opinions), so `JudgeError` only travels between a [`crate::providers::llm::JudgeClient`]
//! and the dispatcher.

use std::time::Duration;

/// Errors raised by a judge client for a single request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JudgeError {
    /// No response within the caller-supplied timeout.
    #[error("judge timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// Transport-level failure (connection refused, DNS, body read).
    #[error("network error: {message}")]
    Network { message: String },

    /// API key missing or rejected.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Provider rate limit hit.
    #[error("rate limited: retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Provider-side 5xx.
    #[error("judge server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Any other non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 2xx response whose envelope could not be read (no choices, no content).
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Client misconfiguration (missing key, bad URL).
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl JudgeError {
    /// Whether the client may retry the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Network { .. } | Self::Server { .. }
        )
    }
}

impl From<reqwest::Error> for JudgeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Invalid catalog or benchmark configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("criterion catalog is empty")]
    EmptyCatalog,

    #[error("duplicate criterion: {name}")]
    DuplicateCriterion { name: String },

    #[error("criterion '{name}' has weight {weight}, expected a value in (0, 1]")]
    InvalidWeight { name: String, weight: f64 },

    #[error("no judge models configured")]
    NoJudges,

    #[error("unknown consensus method '{method}' (supported: average)")]
    UnknownConsensusMethod { method: String },

    #[error("invalid setting {field}: {message}")]
    InvalidSetting { field: String, message: String },
}

/// Aggregation over a sample set that cannot produce statistics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregateError {
    /// Nothing was added; no statistics are fabricated for an empty run.
    #[error("no data: no judged samples have been added")]
    NoData,

    #[error("unknown sampler: {name}")]
    UnknownSampler { name: String },
}
