//! Folding several judge opinions into one [`EvaluationVerdict`].
//!
//! Opinions with `error` set (judge failures and neutral parse fallbacks)
//! carry placeholder scores and do not contribute. Each criterion is reduced
//! over the opinions that scored it; the overall score is reduced over each
//! contributing opinion's own `overall_score`, so the judge's weighting is kept.
//! Spread across judges is the population standard deviation.

use crate::criteria::CriterionCatalog;
use crate::errors::ConfigError;
use crate::model::{ConsensusCriterionScore, EvaluationVerdict, RawJudgeOpinion, NEUTRAL_SCORE};
use crate::stats;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusMethod {
    #[default]
    Average,
}

impl ConsensusMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Average => "average",
        }
    }
}

impl FromStr for ConsensusMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "average" | "mean" => Ok(Self::Average),
            other => Err(ConfigError::UnknownConsensusMethod {
                method: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ConsensusMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative reading of average consensus strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgreementBand {
    High,
    Moderate,
    Low,
}

impl AgreementBand {
    /// `> 0.8` high, `> 0.6` moderate, otherwise low.
    pub fn from_strength(strength: f64) -> Self {
        if strength > 0.8 {
            Self::High
        } else if strength > 0.6 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
        }
    }
}

/// `clamp(1 - std/mean, 0, 1)`, 0 when the mean is not positive.
pub fn consensus_strength(mean: f64, std: f64) -> f64 {
    if mean > 0.0 {
        (1.0 - std / mean).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn consensus(
    opinions: &[RawJudgeOpinion],
    catalog: &CriterionCatalog,
    method: ConsensusMethod,
) -> EvaluationVerdict {
    let judge_identities: Vec<String> = opinions.iter().map(|o| o.judge.clone()).collect();
    let contributing: Vec<&RawJudgeOpinion> = opinions.iter().filter(|o| !o.is_failure()).collect();

    if contributing.is_empty() {
        return all_failed(opinions, catalog, method, judge_identities);
    }

    let per_criterion = match method {
        ConsensusMethod::Average => average_per_criterion(&contributing, catalog),
    };

    let overall: Vec<f64> = contributing.iter().map(|o| o.overall_score).collect();
    let overall_score = stats::mean(&overall).unwrap_or(NEUTRAL_SCORE);
    let overall_std = stats::population_std(&overall);

    let summary = summarize(overall_score, overall_std, contributing.len(), &per_criterion);

    EvaluationVerdict {
        overall_score,
        overall_std,
        per_criterion,
        summary,
        evaluation_time_secs: 0.0,
        contributing_judge_count: contributing.len(),
        judge_identities,
        consensus_method: method,
        opinions: opinions.to_vec(),
        penalties: None,
    }
}

fn average_per_criterion(
    contributing: &[&RawJudgeOpinion],
    catalog: &CriterionCatalog,
) -> Vec<ConsensusCriterionScore> {
    let mut out = Vec::with_capacity(catalog.len());
    for name in catalog.names() {
        let mut scores = Vec::new();
        let mut reasoning = Vec::new();
        let mut judges = Vec::new();
        for op in contributing {
            if let Some(c) = op.per_criterion.get(name) {
                scores.push(c.score);
                reasoning.push(c.reasoning.clone());
                judges.push(op.judge.clone());
            }
        }
        let Some(mean_score) = stats::mean(&scores) else {
            continue;
        };
        let std_score = stats::population_std(&scores);
        out.push(ConsensusCriterionScore {
            criterion: name.to_string(),
            mean_score,
            std_score,
            consensus_strength: consensus_strength(mean_score, std_score),
            individual_scores: scores,
            individual_reasoning: reasoning,
            contributing_judges: judges,
        });
    }
    out
}

fn all_failed(
    opinions: &[RawJudgeOpinion],
    catalog: &CriterionCatalog,
    method: ConsensusMethod,
    judge_identities: Vec<String>,
) -> EvaluationVerdict {
    let per_criterion = catalog
        .names()
        .map(|name| ConsensusCriterionScore {
            criterion: name.to_string(),
            mean_score: NEUTRAL_SCORE,
            std_score: 0.0,
            individual_scores: Vec::new(),
            individual_reasoning: Vec::new(),
            contributing_judges: Vec::new(),
            consensus_strength: 0.0,
        })
        .collect();

    EvaluationVerdict {
        overall_score: NEUTRAL_SCORE,
        overall_std: 0.0,
        per_criterion,
        summary: format!(
            "All {} judge(s) failed; neutral score {:.1}/10 assigned.",
            opinions.len(),
            NEUTRAL_SCORE
        ),
        evaluation_time_secs: 0.0,
        contributing_judge_count: 0,
        judge_identities,
        consensus_method: method,
        opinions: opinions.to_vec(),
        penalties: None,
    }
}

fn summarize(
    overall_mean: f64,
    overall_std: f64,
    judges: usize,
    per_criterion: &[ConsensusCriterionScore],
) -> String {
    let mut parts = vec![format!(
        "Multi-judge consensus score: {:.2}±{:.2}/10 ({} judges).",
        overall_mean, overall_std, judges
    )];

    // Stable sort keeps catalog order among equal means.
    let mut ranked: Vec<&ConsensusCriterionScore> = per_criterion.iter().collect();
    ranked.sort_by(|a, b| b.mean_score.total_cmp(&a.mean_score));

    if let Some(best) = ranked.first() {
        parts.push(format!(
            "Strongest area: {} ({:.2}/10).",
            best.criterion.replace('_', " "),
            best.mean_score
        ));
    }
    if ranked.len() > 1 {
        if let Some(worst) = ranked.last() {
            parts.push(format!(
                "Weakest area: {} ({:.2}/10).",
                worst.criterion.replace('_', " "),
                worst.mean_score
            ));
        }
    }

    let strengths: Vec<f64> = per_criterion.iter().map(|c| c.consensus_strength).collect();
    let avg_strength = stats::mean(&strengths).unwrap_or(0.0);
    parts.push(format!(
        "Judge consensus: {:.2}/1.0 ({} agreement).",
        avg_strength,
        AgreementBand::from_strength(avg_strength).as_str()
    ));

    parts.join(" ")
}
