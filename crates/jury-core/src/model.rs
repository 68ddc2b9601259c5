use crate::criteria::CriterionCatalog;
use crate::judge::consensus::ConsensusMethod;
use crate::judge::penalties::PenaltyReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;
/// Midpoint of the score range; used whenever a judge gives us nothing usable.
pub const NEUTRAL_SCORE: f64 = 5.0;

/// Clamp to [1, 10]; NaN and infinities become the neutral score.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(MIN_SCORE, MAX_SCORE)
    } else {
        NEUTRAL_SCORE
    }
}

/// Generation parameters under comparison (temperature, sampler type, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SamplerConfig(pub BTreeMap<String, serde_json::Value>);

impl SamplerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn temperature(&self) -> Option<f64> {
        self.0.get("temperature").and_then(|v| v.as_f64())
    }

    pub fn sampler_type(&self) -> Option<&str> {
        self.0.get("type").and_then(|v| v.as_str())
    }

    /// Compact description for judge prompts. Temperature and type are the
    /// variables under test, so only those are shown.
    pub fn describe(&self) -> String {
        let temperature = self
            .0
            .get("temperature")
            .map(render_value)
            .unwrap_or_else(|| "N/A".to_string());
        let sampler = self
            .0
            .get("type")
            .map(render_value)
            .unwrap_or_else(|| "N/A".to_string());
        format!("Temperature: {}, Sampler: {}", temperature, sampler)
    }
}

fn render_value(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Which recovery step produced an opinion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategyKind {
    WholeDocument,
    FencedBlock,
    BraceScan,
    Repair,
    ScoreMentions,
    NeutralFallback,
    /// The judge call itself failed; nothing was parsed.
    JudgeFailure,
}

impl RecoveryStrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WholeDocument => "whole_document",
            Self::FencedBlock => "fenced_block",
            Self::BraceScan => "brace_scan",
            Self::Repair => "repair",
            Self::ScoreMentions => "score_mentions",
            Self::NeutralFallback => "neutral_fallback",
            Self::JudgeFailure => "judge_failure",
        }
    }
}

impl std::fmt::Display for RecoveryStrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionOpinion {
    pub score: f64,
    pub reasoning: String,
}

/// One judge's output for one sample. Always populated, even when the call or
/// the parse failed (`error` is then set and scores are neutral).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawJudgeOpinion {
    pub judge: String,
    pub overall_score: f64,
    pub per_criterion: BTreeMap<String, CriterionOpinion>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recovery: RecoveryStrategyKind,
}

impl RawJudgeOpinion {
    /// Neutral opinion: midpoint score for every catalog criterion.
    pub fn neutral(
        judge: impl Into<String>,
        catalog: &CriterionCatalog,
        error: impl Into<String>,
        recovery: RecoveryStrategyKind,
    ) -> Self {
        let error = error.into();
        let reasoning = match recovery {
            RecoveryStrategyKind::JudgeFailure => format!("Judge failed: {}", error),
            _ => format!("Failed to parse judgment: {}", error),
        };
        let per_criterion = catalog
            .names()
            .map(|name| {
                (
                    name.to_string(),
                    CriterionOpinion {
                        score: NEUTRAL_SCORE,
                        reasoning: reasoning.clone(),
                    },
                )
            })
            .collect();
        let judge = judge.into();
        Self {
            summary: format!("Evaluation failed for {}: {}", judge, error),
            judge,
            overall_score: NEUTRAL_SCORE,
            per_criterion,
            error: Some(error),
            recovery,
        }
    }

    /// Failure opinions carry placeholder scores and do not count towards consensus.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// True when the parser had to go past a clean structured parse.
    pub fn used_fallback(&self) -> bool {
        !matches!(
            self.recovery,
            RecoveryStrategyKind::WholeDocument | RecoveryStrategyKind::JudgeFailure
        )
    }
}

/// Per-criterion reconciliation across judges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusCriterionScore {
    pub criterion: String,
    pub mean_score: f64,
    pub std_score: f64,
    pub individual_scores: Vec<f64>,
    pub individual_reasoning: Vec<String>,
    pub contributing_judges: Vec<String>,
    /// `clamp(1 - std/mean, 0, 1)`; 0 when mean is 0.
    pub consensus_strength: f64,
}

/// Per-criterion score as seen downstream: either a single judge's number or a
/// consensus over several. Resolved once when the verdict is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriterionScore {
    SingleJudgeScore {
        criterion: String,
        score: f64,
        reasoning: String,
    },
    ConsensusScore(ConsensusCriterionScore),
}

impl CriterionScore {
    pub fn criterion(&self) -> &str {
        match self {
            Self::SingleJudgeScore { criterion, .. } => criterion,
            Self::ConsensusScore(c) => &c.criterion,
        }
    }

    pub fn representative_score(&self) -> f64 {
        match self {
            Self::SingleJudgeScore { score, .. } => *score,
            Self::ConsensusScore(c) => c.mean_score,
        }
    }

    /// 0 for the placeholder rows of a verdict where every judge failed.
    pub fn contributor_count(&self) -> usize {
        match self {
            Self::SingleJudgeScore { .. } => 1,
            Self::ConsensusScore(c) => c.contributing_judges.len(),
        }
    }
}

/// The unit passed downstream for one judged sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    pub overall_score: f64,
    pub overall_std: f64,
    pub per_criterion: Vec<ConsensusCriterionScore>,
    pub summary: String,
    pub evaluation_time_secs: f64,
    /// Judges whose opinion actually went into the numbers.
    pub contributing_judge_count: usize,
    /// Every judge that was asked, in configuration order.
    pub judge_identities: Vec<String>,
    pub consensus_method: ConsensusMethod,
    pub opinions: Vec<RawJudgeOpinion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalties: Option<PenaltyReport>,
}

impl EvaluationVerdict {
    pub fn criterion_scores(&self) -> Vec<CriterionScore> {
        self.per_criterion
            .iter()
            .map(|c| {
                if c.contributing_judges.len() == 1 {
                    CriterionScore::SingleJudgeScore {
                        criterion: c.criterion.clone(),
                        score: c.mean_score,
                        reasoning: c.individual_reasoning.first().cloned().unwrap_or_default(),
                    }
                } else {
                    CriterionScore::ConsensusScore(c.clone())
                }
            })
            .collect()
    }

    pub fn failed_judge_count(&self) -> usize {
        self.opinions
            .iter()
            .filter(|o| o.recovery == RecoveryStrategyKind::JudgeFailure)
            .count()
    }

    pub fn fallback_count(&self) -> usize {
        self.opinions.iter().filter(|o| o.used_fallback()).count()
    }
}

/// What the generation side hands over: a fully formed sample awaiting judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleInput {
    pub prompt: String,
    pub sampler_name: String,
    #[serde(default)]
    pub sampler_config: SamplerConfig,
    #[serde(alias = "text")]
    pub generated_text: String,
    #[serde(default, alias = "repetition")]
    pub repetition_index: u32,
}

impl SampleInput {
    pub fn into_sample(self, verdict: EvaluationVerdict) -> Sample {
        let sample_id = crate::fingerprint::sample_id(
            &self.prompt,
            &self.sampler_name,
            &self.generated_text,
            self.repetition_index,
        );
        Sample {
            sample_id,
            prompt: self.prompt,
            sampler_name: self.sampler_name,
            sampler_config: self.sampler_config,
            generated_text: self.generated_text,
            repetition_index: self.repetition_index,
            verdict,
        }
    }
}

/// A judged sample. Immutable once handed to the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub sample_id: String,
    pub prompt: String,
    pub sampler_name: String,
    pub sampler_config: SamplerConfig,
    pub generated_text: String,
    pub repetition_index: u32,
    pub verdict: EvaluationVerdict,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_handles_out_of_range_and_nan() {
        assert_eq!(clamp_score(0.0), MIN_SCORE);
        assert_eq!(clamp_score(42.0), MAX_SCORE);
        assert_eq!(clamp_score(f64::NAN), NEUTRAL_SCORE);
        assert_eq!(clamp_score(f64::INFINITY), NEUTRAL_SCORE);
        assert_eq!(clamp_score(7.5), 7.5);
    }

    #[test]
    fn sampler_description() {
        let cfg = SamplerConfig::new()
            .with("temperature", 0.7)
            .with("type", "min_p");
        assert_eq!(cfg.describe(), "Temperature: 0.7, Sampler: min_p");
        assert_eq!(cfg.temperature(), Some(0.7));
        assert_eq!(cfg.sampler_type(), Some("min_p"));
        assert_eq!(
            SamplerConfig::new().describe(),
            "Temperature: N/A, Sampler: N/A"
        );
    }

    #[test]
    fn neutral_opinion_covers_catalog() {
        let catalog = CriterionCatalog::creative_writing();
        let op = RawJudgeOpinion::neutral(
            "judge-a",
            &catalog,
            "timeout",
            RecoveryStrategyKind::JudgeFailure,
        );
        assert_eq!(op.per_criterion.len(), catalog.len());
        assert!(op.per_criterion.values().all(|c| c.score == NEUTRAL_SCORE));
        assert!(op.is_failure());
        assert!(!op.used_fallback());
        assert!(op.per_criterion["engagement"]
            .reasoning
            .starts_with("Judge failed"));
    }

    #[test]
    fn sample_input_accepts_legacy_field_names() {
        let raw = r#"{"prompt":"p","sampler_name":"greedy","text":"once","repetition":2}"#;
        let input: SampleInput = serde_json::from_str(raw).unwrap();
        assert_eq!(input.generated_text, "once");
        assert_eq!(input.repetition_index, 2);
        assert!(input.sampler_config.0.is_empty());
    }
}
