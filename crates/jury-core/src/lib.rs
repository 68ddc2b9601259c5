//! Multi-judge scoring of sampler outputs.
//!
//! Samples produced under different sampling configurations are sent to one or
//! more LLM judges, the judges' (often messy) answers are recovered into
//! per-criterion scores, folded into a consensus verdict per sample, and the
//! verdicts are aggregated into per-sampler statistics and pairwise
//! comparisons.
//!
//! Pipeline, leaves first:
//!
//! - [`criteria`]: weighted evaluation dimensions
//! - [`providers::llm`]: the judge client boundary (HTTP or fake)
//! - [`judge::recovery`]: turns raw judge text into a [`model::RawJudgeOpinion`]
//! - [`judge`]: concurrent fan-out to every judge identity
//! - [`judge::consensus`]: N opinions -> one [`model::EvaluationVerdict`]
//! - [`aggregate`]: many samples -> per-sampler statistics
//! - [`compare`]: per-sampler statistics -> effect sizes and rankings
//! - [`pipeline`]: runs the above over a batch of samples
//! - [`report`]: the JSON artifact and console summary

pub mod aggregate;
pub mod compare;
pub mod config;
pub mod criteria;
pub mod errors;
pub mod fingerprint;
pub mod judge;
pub mod model;
pub mod pipeline;
pub mod providers;
pub mod report;
pub mod stats;

#[cfg(test)]
mod test_support;

pub use aggregate::{AggregateReport, SampleAggregator, SamplerStatistics};
pub use compare::{analyze, BenchmarkVerdict};
pub use criteria::{Criterion, CriterionCatalog};
pub use errors::{AggregateError, ConfigError, JudgeError};
pub use judge::{JudgeIdentity, JudgePanel, JudgePanelConfig};
pub use model::{EvaluationVerdict, RawJudgeOpinion, Sample, SampleInput, SamplerConfig};
pub use pipeline::{BenchmarkRunner, RunCounts, RunOutcome};
