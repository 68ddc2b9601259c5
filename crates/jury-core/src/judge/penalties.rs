//! Instruction-following penalties applied on top of a judged score.
//!
//! Penalty amounts are negative point deltas. They are summed and added to
//! the overall score, which stays within [1, 10].

use crate::errors::ConfigError;
use crate::model::{EvaluationVerdict, MAX_SCORE, MIN_SCORE};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PenaltyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub word_count: Option<WordCountPenalty>,
    #[serde(default)]
    pub empty_generation: Option<EmptyGenerationPenalty>,
    #[serde(default)]
    pub meta_commentary: Option<MetaCommentaryPenalty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationLevel {
    /// Deviation (in words) that must be exceeded for this level to apply.
    pub threshold: usize,
    pub penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCountPenalty {
    pub target_range: (usize, usize),
    pub minor: DeviationLevel,
    pub moderate: DeviationLevel,
    pub severe: DeviationLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmptyGenerationPenalty {
    pub penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaCommentaryPenalty {
    /// Case-insensitive substrings, e.g. "as an ai".
    pub patterns: Vec<String>,
    pub penalty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
    WordCount,
    EmptyGeneration,
    MetaCommentary,
}

impl PenaltyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WordCount => "word_count",
            Self::EmptyGeneration => "empty_generation",
            Self::MetaCommentary => "meta_commentary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyHit {
    pub kind: PenaltyKind,
    pub severity: String,
    pub penalty: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyReport {
    pub original_score: f64,
    pub total_penalty: f64,
    pub final_score: f64,
    pub penalties: Vec<PenaltyHit>,
}

impl PenaltyConfig {
    /// Every penalty amount must be a deduction (zero or negative).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut amounts: Vec<(&str, f64)> = Vec::new();
        if let Some(wc) = &self.word_count {
            if wc.target_range.0 > wc.target_range.1 {
                return Err(ConfigError::InvalidSetting {
                    field: "penalties.word_count.target_range".into(),
                    message: "lower bound exceeds upper bound".into(),
                });
            }
            amounts.push(("penalties.word_count.minor.penalty", wc.minor.penalty));
            amounts.push(("penalties.word_count.moderate.penalty", wc.moderate.penalty));
            amounts.push(("penalties.word_count.severe.penalty", wc.severe.penalty));
        }
        if let Some(e) = &self.empty_generation {
            amounts.push(("penalties.empty_generation.penalty", e.penalty));
        }
        if let Some(m) = &self.meta_commentary {
            amounts.push(("penalties.meta_commentary.penalty", m.penalty));
        }
        for (field, amount) in amounts {
            if amount > 0.0 || amount.is_nan() {
                return Err(ConfigError::InvalidSetting {
                    field: field.to_string(),
                    message: format!("must be zero or negative, got {}", amount),
                });
            }
        }
        Ok(())
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Applies every enabled penalty that fires. Leaves `verdict.penalties`
/// as `None` when nothing fires.
pub fn apply_penalties(verdict: &mut EvaluationVerdict, text: &str, config: &PenaltyConfig) {
    if !config.enabled {
        return;
    }
    let words = word_count(text);

    let hits: Vec<PenaltyHit> = [
        config.word_count.as_ref().and_then(|c| word_count_hit(c, words)),
        config
            .empty_generation
            .as_ref()
            .and_then(|c| empty_generation_hit(c, text, words)),
        config
            .meta_commentary
            .as_ref()
            .and_then(|c| meta_commentary_hit(c, text)),
    ]
    .into_iter()
    .flatten()
    .collect();

    if hits.is_empty() {
        return;
    }

    let total_penalty: f64 = hits.iter().map(|h| h.penalty).sum();
    let original_score = verdict.overall_score;
    let final_score = (original_score + total_penalty).clamp(MIN_SCORE, MAX_SCORE);
    let kinds = hits
        .iter()
        .map(|h| h.kind.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    info!(
        total_penalty,
        count = hits.len(),
        "applied instruction penalties"
    );

    verdict
        .summary
        .push_str(&format!(" | Penalties: {:.1} pts ({})", total_penalty, kinds));
    verdict.overall_score = final_score;
    verdict.penalties = Some(PenaltyReport {
        original_score,
        total_penalty,
        final_score,
        penalties: hits,
    });
}

fn word_count_hit(config: &WordCountPenalty, words: usize) -> Option<PenaltyHit> {
    let (min, max) = config.target_range;
    let deviation = if words < min {
        min - words
    } else if words > max {
        words - max
    } else {
        return None;
    };

    let (severity, level) = if deviation > config.severe.threshold {
        ("severe", &config.severe)
    } else if deviation > config.moderate.threshold {
        ("moderate", &config.moderate)
    } else if deviation > config.minor.threshold {
        ("minor", &config.minor)
    } else {
        return None;
    };

    Some(PenaltyHit {
        kind: PenaltyKind::WordCount,
        severity: severity.to_string(),
        penalty: level.penalty,
        description: format!(
            "{} word count deviation: {} words (target: {}-{})",
            severity, words, min, max
        ),
    })
}

fn empty_generation_hit(
    config: &EmptyGenerationPenalty,
    text: &str,
    words: usize,
) -> Option<PenaltyHit> {
    if words > 0 && !text.trim().is_empty() {
        return None;
    }
    Some(PenaltyHit {
        kind: PenaltyKind::EmptyGeneration,
        severity: "critical".to_string(),
        penalty: config.penalty,
        description: "Empty or failed text generation".to_string(),
    })
}

fn meta_commentary_hit(config: &MetaCommentaryPenalty, text: &str) -> Option<PenaltyHit> {
    let lower = text.to_lowercase();
    let detected: Vec<&str> = config
        .patterns
        .iter()
        .filter(|p| lower.contains(&p.to_lowercase()))
        .map(String::as_str)
        .collect();
    if detected.is_empty() {
        return None;
    }
    Some(PenaltyHit {
        kind: PenaltyKind::MetaCommentary,
        severity: "moderate".to_string(),
        penalty: config.penalty,
        description: format!("Meta-commentary detected: {}", detected.join(", ")),
    })
}
