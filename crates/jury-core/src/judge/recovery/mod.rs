//! Response recovery: raw judge text -> [`RawJudgeOpinion`], never failing.
//!
//! Judges vary in how well they follow the requested layout. The parser walks
//! an ordered list of [`RecoveryStrategy`] implementations and stops at the
//! first one that yields a judgment. When none does, the opinion is neutral
//! (5.0 everywhere) with `error` set.
//!
//! Default order:
//! 1. whole document as JSON
//! 2. fenced code block
//! 3. balanced-brace scan
//! 4. mechanical repair of near-JSON
//! 5. `<n>/10` score mentions

mod strategies;

pub use strategies::{BraceScan, FencedBlock, Repair, ScoreMentions, WholeDocument};

use crate::criteria::CriterionCatalog;
use crate::model::{
    clamp_score, CriterionOpinion, RawJudgeOpinion, RecoveryStrategyKind, NEUTRAL_SCORE,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

pub const NO_REASONING: &str = "No reasoning provided";
pub const NO_SUMMARY: &str = "No summary provided";

/// Longest excerpt of the raw response kept in a parse-failure message.
const EXCERPT_CHARS: usize = 120;

/// Normalised judgment before it is attributed to a judge.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedJudgment {
    pub overall_score: f64,
    pub per_criterion: BTreeMap<String, CriterionOpinion>,
    pub summary: String,
}

pub trait RecoveryStrategy: Send + Sync {
    fn kind(&self) -> RecoveryStrategyKind;

    /// `None` means "not my format"; the parser moves on.
    fn try_parse(&self, text: &str, catalog: &CriterionCatalog) -> Option<ParsedJudgment>;
}

pub struct RecoveryParser {
    catalog: CriterionCatalog,
    strategies: Vec<Box<dyn RecoveryStrategy>>,
}

impl std::fmt::Debug for RecoveryParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryParser")
            .field("strategies", &self.strategy_order())
            .finish()
    }
}

impl RecoveryParser {
    pub fn new(catalog: CriterionCatalog) -> Self {
        Self::with_strategies(catalog, default_strategies())
    }

    pub fn with_strategies(
        catalog: CriterionCatalog,
        strategies: Vec<Box<dyn RecoveryStrategy>>,
    ) -> Self {
        Self {
            catalog,
            strategies,
        }
    }

    pub fn strategy_order(&self) -> Vec<RecoveryStrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub fn catalog(&self) -> &CriterionCatalog {
        &self.catalog
    }

    pub fn parse(&self, judge: &str, text: &str) -> RawJudgeOpinion {
        for strategy in &self.strategies {
            if let Some(parsed) = strategy.try_parse(text, &self.catalog) {
                let kind = strategy.kind();
                if kind != RecoveryStrategyKind::WholeDocument {
                    debug!(judge = %judge, strategy = %kind, "judge response recovered by fallback");
                }
                return RawJudgeOpinion {
                    judge: judge.to_string(),
                    overall_score: parsed.overall_score,
                    per_criterion: parsed.per_criterion,
                    summary: parsed.summary,
                    error: None,
                    recovery: kind,
                };
            }
        }

        debug!(judge = %judge, "no recovery strategy matched; using neutral scores");
        RawJudgeOpinion::neutral(
            judge,
            &self.catalog,
            format!("unparseable judge response: {}", excerpt(text)),
            RecoveryStrategyKind::NeutralFallback,
        )
    }
}

pub fn default_strategies() -> Vec<Box<dyn RecoveryStrategy>> {
    vec![
        Box::new(WholeDocument),
        Box::new(FencedBlock),
        Box::new(BraceScan),
        Box::new(Repair),
        Box::new(ScoreMentions),
    ]
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    let mut out: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    if trimmed.chars().count() > EXCERPT_CHARS {
        out.push_str("...");
    }
    out
}

/// Object with `criterion_scores` (object) or a numeric `overall_score`.
pub(crate) fn has_expected_shape(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let has_criteria = obj
        .get("criterion_scores")
        .map(|v| v.is_object())
        .unwrap_or(false);
    let has_overall = obj.get("overall_score").and_then(as_number).is_some();
    has_criteria || has_overall
}

/// Parse `candidate` as JSON and normalise it when it has the expected shape.
pub(crate) fn parse_record(candidate: &str, catalog: &CriterionCatalog) -> Option<ParsedJudgment> {
    let value: Value = serde_json::from_str(candidate.trim()).ok()?;
    if !has_expected_shape(&value) {
        return None;
    }
    Some(normalise(&value, catalog))
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn score_of(v: &Value) -> f64 {
    match v {
        Value::Object(obj) => obj
            .get("score")
            .and_then(as_number)
            .map(clamp_score)
            .unwrap_or(NEUTRAL_SCORE),
        other => as_number(other).map(clamp_score).unwrap_or(NEUTRAL_SCORE),
    }
}

fn reasoning_of(v: &Value) -> String {
    v.get("reasoning")
        .and_then(|r| r.as_str())
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(NO_REASONING)
        .to_string()
}

/// Clamp scores, fill defaults, drop criteria outside the catalog.
pub(crate) fn normalise(value: &Value, catalog: &CriterionCatalog) -> ParsedJudgment {
    let mut per_criterion = BTreeMap::new();
    if let Some(scores) = value.get("criterion_scores").and_then(|v| v.as_object()) {
        for (name, entry) in scores {
            if !catalog.contains(name) {
                continue;
            }
            per_criterion.insert(
                name.clone(),
                CriterionOpinion {
                    score: score_of(entry),
                    reasoning: reasoning_of(entry),
                },
            );
        }
    }

    let overall_score = match value.get("overall_score").and_then(as_number) {
        Some(score) => clamp_score(score),
        None => {
            let scores: BTreeMap<String, f64> = per_criterion
                .iter()
                .map(|(k, v)| (k.clone(), v.score))
                .collect();
            catalog
                .weighted_average(&scores)
                .map(clamp_score)
                .unwrap_or(NEUTRAL_SCORE)
        }
    };

    let summary = value
        .get("summary")
        .and_then(|s| s.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_SUMMARY)
        .to_string();

    ParsedJudgment {
        overall_score,
        per_criterion,
        summary,
    }
}
