//! Sample statistics aggregation.
//!
//! Samples are appended by one owner (the pipeline driver) and never mutated.
//! [`SampleAggregator::compute`] derives every statistic from scratch, so it
//! is idempotent: the same sample list always yields the same report.

use crate::errors::AggregateError;
use crate::model::{Sample, SamplerConfig};
use crate::stats::{self, Summary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSamplerStatistics {
    pub prompt: String,
    pub sampler_name: String,
    /// Overall scores of each repetition, in insertion order.
    pub scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
    pub confidence_interval: (f64, f64),
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionStatistics {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
    pub confidence_interval: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerStatistics {
    pub sampler_name: String,
    pub sampler_config: SamplerConfig,
    pub overall_mean: f64,
    pub overall_std: f64,
    pub overall_confidence_interval: (f64, f64),
    /// `1 / (1 + std(per-prompt means))`, in (0, 1]; 1 with fewer than two prompts.
    pub prompt_consistency: f64,
    pub per_prompt: Vec<PromptSamplerStatistics>,
    pub per_criterion: BTreeMap<String, CriterionStatistics>,
    pub total_samples: usize,
    pub prompts_covered: usize,
}

impl SamplerStatistics {
    /// Every repetition score across all prompts.
    pub fn all_scores(&self) -> Vec<f64> {
        self.per_prompt
            .iter()
            .flat_map(|p| p.scores.iter().copied())
            .collect()
    }

    pub fn prompt_stats(&self, prompt: &str) -> Option<&PromptSamplerStatistics> {
        self.per_prompt.iter().find(|p| p.prompt == prompt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub samplers: BTreeMap<String, SamplerStatistics>,
    pub prompts: Vec<String>,
    pub total_samples: usize,
}

impl AggregateReport {
    pub fn sampler(&self, name: &str) -> Result<&SamplerStatistics, AggregateError> {
        self.samplers
            .get(name)
            .ok_or_else(|| AggregateError::UnknownSampler {
                name: name.to_string(),
            })
    }
}

#[derive(Debug, Default, Clone)]
pub struct SampleAggregator {
    samples: Vec<Sample>,
}

impl SampleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    pub fn compute(&self) -> Result<AggregateReport, AggregateError> {
        if self.samples.is_empty() {
            return Err(AggregateError::NoData);
        }

        let mut by_sampler: BTreeMap<&str, Vec<&Sample>> = BTreeMap::new();
        for s in &self.samples {
            by_sampler.entry(s.sampler_name.as_str()).or_default().push(s);
        }

        let mut samplers = BTreeMap::new();
        for (name, samples) in by_sampler {
            samplers.insert(name.to_string(), sampler_statistics(name, &samples)?);
        }

        let mut prompts: Vec<String> = self.samples.iter().map(|s| s.prompt.clone()).collect();
        prompts.sort();
        prompts.dedup();

        Ok(AggregateReport {
            samplers,
            prompts,
            total_samples: self.samples.len(),
        })
    }
}

fn prompt_statistics(
    prompt: &str,
    sampler_name: &str,
    samples: &[&Sample],
) -> Result<PromptSamplerStatistics, AggregateError> {
    let scores: Vec<f64> = samples.iter().map(|s| s.verdict.overall_score).collect();
    let mean = stats::mean(&scores).ok_or(AggregateError::NoData)?;
    let confidence_interval = stats::confidence_interval(&scores).ok_or(AggregateError::NoData)?;
    Ok(PromptSamplerStatistics {
        prompt: prompt.to_string(),
        sampler_name: sampler_name.to_string(),
        std: stats::sample_std(&scores),
        sample_size: scores.len(),
        scores,
        mean,
        confidence_interval,
    })
}

fn sampler_statistics(
    sampler_name: &str,
    samples: &[&Sample],
) -> Result<SamplerStatistics, AggregateError> {
    let mut by_prompt: BTreeMap<&str, Vec<&Sample>> = BTreeMap::new();
    for s in samples {
        by_prompt.entry(s.prompt.as_str()).or_default().push(*s);
    }

    let per_prompt = by_prompt
        .iter()
        .map(|(prompt, group)| prompt_statistics(prompt, sampler_name, group))
        .collect::<Result<Vec<_>, _>>()?;

    let all_scores: Vec<f64> = per_prompt
        .iter()
        .flat_map(|p| p.scores.iter().copied())
        .collect();
    let prompt_means: Vec<f64> = per_prompt.iter().map(|p| p.mean).collect();

    let overall_mean = stats::mean(&all_scores).ok_or(AggregateError::NoData)?;
    let overall_confidence_interval =
        stats::confidence_interval(&all_scores).ok_or(AggregateError::NoData)?;

    Ok(SamplerStatistics {
        sampler_name: sampler_name.to_string(),
        sampler_config: samples
            .first()
            .map(|s| s.sampler_config.clone())
            .unwrap_or_default(),
        overall_mean,
        overall_std: stats::sample_std(&all_scores),
        overall_confidence_interval,
        prompt_consistency: prompt_consistency(&prompt_means),
        per_criterion: criterion_statistics(samples),
        total_samples: all_scores.len(),
        prompts_covered: per_prompt.len(),
        per_prompt,
    })
}

/// 1 when there is at most one prompt or all prompt means are equal; strictly
/// decreasing in the spread of prompt means.
pub fn prompt_consistency(prompt_means: &[f64]) -> f64 {
    1.0 / (1.0 + stats::sample_std(prompt_means))
}

fn criterion_statistics(samples: &[&Sample]) -> BTreeMap<String, CriterionStatistics> {
    let mut scores: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for s in samples {
        for c in s.verdict.criterion_scores() {
            if c.contributor_count() == 0 {
                continue;
            }
            scores
                .entry(c.criterion().to_string())
                .or_default()
                .push(c.representative_score());
        }
    }

    scores
        .into_iter()
        .filter_map(|(name, values)| {
            let summary = Summary::of(&values)?;
            let confidence_interval = stats::confidence_interval(&values)?;
            Some((
                name,
                CriterionStatistics {
                    mean: summary.mean,
                    std: summary.std,
                    min: summary.min,
                    max: summary.max,
                    count: summary.count,
                    confidence_interval,
                },
            ))
        })
        .collect()
}
