//! Comparative analysis across samplers.
//!
//! Significance here is an approximation read off the effect size, not a
//! hypothesis test: |d| > 0.8 -> 0.01, > 0.5 -> 0.05, > 0.2 -> 0.10, else
//! 0.50. Pairs where either side has fewer than two samples get 1.0.

use crate::aggregate::{AggregateReport, SamplerStatistics};
use crate::errors::AggregateError;
use crate::stats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type PairwiseMatrix = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectMagnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectMagnitude {
    pub fn from_effect_size(d: f64) -> Self {
        let d = d.abs();
        if d > 0.8 {
            Self::Large
        } else if d > 0.5 {
            Self::Medium
        } else if d > 0.2 {
            Self::Small
        } else {
            Self::Negligible
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negligible => "Negligible",
            Self::Small => "Small",
            Self::Medium => "Medium",
            Self::Large => "Large",
        }
    }
}

/// Approximate significance value for an effect size; smaller means stronger.
pub fn approximate_significance(effect_size: f64) -> f64 {
    match EffectMagnitude::from_effect_size(effect_size) {
        EffectMagnitude::Large => 0.01,
        EffectMagnitude::Medium => 0.05,
        EffectMagnitude::Small => 0.10,
        EffectMagnitude::Negligible => 0.50,
    }
}

/// Final comparison. Either fully populated or not produced at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkVerdict {
    pub sampler_stats: BTreeMap<String, SamplerStatistics>,
    /// `pairwise_effect_size[a][b] == -pairwise_effect_size[b][a]`; diagonal 0.
    pub pairwise_effect_size: PairwiseMatrix,
    pub pairwise_significance: PairwiseMatrix,
    pub best_sampler_per_prompt: BTreeMap<String, String>,
    pub most_consistent_sampler: String,
    pub highest_quality_sampler: String,
}

impl BenchmarkVerdict {
    /// Samplers by overall mean, best first; ties by name.
    pub fn ranking(&self) -> Vec<&SamplerStatistics> {
        let mut ranked: Vec<&SamplerStatistics> = self.sampler_stats.values().collect();
        ranked.sort_by(|a, b| {
            b.overall_mean
                .total_cmp(&a.overall_mean)
                .then_with(|| a.sampler_name.cmp(&b.sampler_name))
        });
        ranked
    }

    pub fn effect_size(&self, a: &str, b: &str) -> Option<f64> {
        self.pairwise_effect_size.get(a)?.get(b).copied()
    }

    pub fn significance(&self, a: &str, b: &str) -> Option<f64> {
        self.pairwise_significance.get(a)?.get(b).copied()
    }

    /// Number of prompts each sampler won, most wins first.
    pub fn prompt_wins(&self) -> Vec<(String, usize)> {
        let mut wins: BTreeMap<&str, usize> = BTreeMap::new();
        for winner in self.best_sampler_per_prompt.values() {
            *wins.entry(winner.as_str()).or_default() += 1;
        }
        let mut out: Vec<(String, usize)> =
            wins.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }
}

pub fn analyze(report: &AggregateReport) -> Result<BenchmarkVerdict, AggregateError> {
    if report.samplers.is_empty() {
        return Err(AggregateError::NoData);
    }

    let scores: BTreeMap<&str, Vec<f64>> = report
        .samplers
        .iter()
        .map(|(name, s)| (name.as_str(), s.all_scores()))
        .collect();

    let mut effect = PairwiseMatrix::new();
    let mut significance = PairwiseMatrix::new();
    for (a, scores_a) in &scores {
        let row_effect = effect.entry(a.to_string()).or_default();
        let row_sig = significance.entry(a.to_string()).or_default();
        for (b, scores_b) in &scores {
            if a == b {
                row_effect.insert(b.to_string(), 0.0);
                row_sig.insert(b.to_string(), 1.0);
                continue;
            }
            let d = stats::cohens_d(scores_a, scores_b);
            row_effect.insert(b.to_string(), d);
            let p = if scores_a.len() < 2 || scores_b.len() < 2 {
                1.0
            } else {
                approximate_significance(d)
            };
            row_sig.insert(b.to_string(), p);
        }
    }

    let mut best_sampler_per_prompt = BTreeMap::new();
    for prompt in &report.prompts {
        let winner = pick_max(report.samplers.values().filter_map(|s| {
            s.prompt_stats(prompt)
                .map(|p| (s.sampler_name.as_str(), p.mean))
        }));
        if let Some(w) = winner {
            best_sampler_per_prompt.insert(prompt.clone(), w.to_string());
        }
    }

    let most_consistent_sampler = pick_max(
        report
            .samplers
            .values()
            .map(|s| (s.sampler_name.as_str(), s.prompt_consistency)),
    )
    .ok_or(AggregateError::NoData)?
    .to_string();

    let highest_quality_sampler = pick_max(
        report
            .samplers
            .values()
            .map(|s| (s.sampler_name.as_str(), s.overall_mean)),
    )
    .ok_or(AggregateError::NoData)?
    .to_string();

    Ok(BenchmarkVerdict {
        sampler_stats: report.samplers.clone(),
        pairwise_effect_size: effect,
        pairwise_significance: significance,
        best_sampler_per_prompt,
        most_consistent_sampler,
        highest_quality_sampler,
    })
}

/// Highest value; ties go to the lexicographically smallest name.
fn pick_max<'a>(candidates: impl Iterator<Item = (&'a str, f64)>) -> Option<&'a str> {
    let mut best: Option<(&str, f64)> = None;
    for (name, value) in candidates {
        best = match best {
            None => Some((name, value)),
            Some((bn, bv)) if value > bv || (value == bv && name < bn) => Some((name, value)),
            keep => keep,
        };
    }
    best.map(|(name, _)| name)
}
