//! Builders shared by unit tests.

use crate::criteria::CriterionCatalog;
use crate::judge::consensus::{consensus, ConsensusMethod};
use crate::model::{
    CriterionOpinion, RawJudgeOpinion, RecoveryStrategyKind, Sample, SampleInput, SamplerConfig,
};

/// Opinion scoring every catalog criterion (and the overall) with `score`.
pub(crate) fn uniform_opinion(judge: &str, score: f64) -> RawJudgeOpinion {
    let catalog = CriterionCatalog::creative_writing();
    RawJudgeOpinion {
        judge: judge.to_string(),
        overall_score: score,
        per_criterion: catalog
            .names()
            .map(|n| {
                (
                    n.to_string(),
                    CriterionOpinion {
                        score,
                        reasoning: "test".to_string(),
                    },
                )
            })
            .collect(),
        summary: "test".to_string(),
        error: None,
        recovery: RecoveryStrategyKind::WholeDocument,
    }
}

/// Single-judge sample whose overall and criterion scores are all `score`.
pub(crate) fn sample(prompt: &str, sampler: &str, repetition: u32, score: f64) -> Sample {
    let catalog = CriterionCatalog::creative_writing();
    let verdict = consensus(
        &[uniform_opinion("judge", score)],
        &catalog,
        ConsensusMethod::Average,
    );
    SampleInput {
        prompt: prompt.to_string(),
        sampler_name: sampler.to_string(),
        sampler_config: SamplerConfig::new().with("type", sampler),
        generated_text: format!("{} / {} / {}", prompt, sampler, repetition),
        repetition_index: repetition,
    }
    .into_sample(verdict)
}
