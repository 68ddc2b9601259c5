pub mod console;
pub mod json;

use crate::compare::BenchmarkVerdict;
use crate::model::Sample;
use crate::pipeline::RunCounts;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// Everything a judging run produced. Scores are stored unrounded; rounding
/// happens only in [`console`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkArtifact {
    pub schema_version: u32,
    pub run_id: String,
    pub benchmark_name: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub model_name: String,
    pub samples: Vec<Sample>,
    pub verdict: BenchmarkVerdict,
    pub counts: RunCounts,
}

impl BenchmarkArtifact {
    pub fn new(
        benchmark_name: impl Into<String>,
        model_name: impl Into<String>,
        samples: Vec<Sample>,
        verdict: BenchmarkVerdict,
        counts: RunCounts,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            run_id: uuid::Uuid::new_v4().to_string(),
            benchmark_name: benchmark_name.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            model_name: model_name.into(),
            samples,
            verdict,
            counts,
        }
    }
}
