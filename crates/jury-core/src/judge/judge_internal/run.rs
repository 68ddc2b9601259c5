use super::client::{call_judge_impl, failure_opinion};
use crate::judge::consensus::consensus;
use crate::judge::{prompt, JudgePanel};
use crate::model::{EvaluationVerdict, RawJudgeOpinion, SamplerConfig};
use crate::providers::llm::JudgeRequest;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub(crate) async fn dispatch_impl(
    panel: &JudgePanel,
    text: &str,
    original_prompt: &str,
    sampler_config: &SamplerConfig,
) -> Vec<RawJudgeOpinion> {
    let cfg = &panel.config;
    let user_prompt = prompt::build_user_prompt(text, original_prompt, sampler_config, panel.catalog());
    let schema = cfg
        .judges
        .iter()
        .any(|j| j.uses_structured_output())
        .then(|| prompt::response_schema(panel.catalog()));

    let sem = Arc::new(Semaphore::new(cfg.effective_concurrency()));
    let mut join_set = JoinSet::new();

    for (idx, identity) in cfg.judges.iter().enumerate() {
        let request = JudgeRequest {
            judge: identity.model.clone(),
            system_prompt: prompt::SYSTEM_PROMPT.to_string(),
            user_prompt: user_prompt.clone(),
            response_schema: if identity.uses_structured_output() {
                schema.clone()
            } else {
                None
            },
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        };
        let sem = sem.clone();
        let client = panel.client.clone();
        let parser = panel.parser.clone();
        let limit = cfg.timeout;

        join_set.spawn(async move {
            let opinion = match sem.acquire_owned().await {
                Ok(_permit) => call_judge_impl(client.as_ref(), &parser, &request, limit).await,
                Err(e) => failure_opinion(&request.judge, &parser, format!("dispatch closed: {}", e)),
            };
            (idx, opinion)
        });
    }

    // Arrival order is arbitrary; slot by configuration position.
    let mut slots: Vec<Option<RawJudgeOpinion>> = vec![None; cfg.judges.len()];
    while let Some(res) = join_set.join_next().await {
        match res {
            Ok((idx, opinion)) => slots[idx] = Some(opinion),
            Err(e) => warn!(error = %e, "judge task failed"),
        }
    }

    slots
        .into_iter()
        .zip(cfg.judges.iter())
        .map(|(slot, identity)| {
            slot.unwrap_or_else(|| {
                failure_opinion(&identity.model, &panel.parser, "judge task panicked or was cancelled")
            })
        })
        .collect()
}

pub(crate) async fn evaluate_impl(
    panel: &JudgePanel,
    text: &str,
    original_prompt: &str,
    sampler_config: &SamplerConfig,
) -> EvaluationVerdict {
    let started = Instant::now();
    let opinions = dispatch_impl(panel, text, original_prompt, sampler_config).await;
    let mut verdict = consensus(&opinions, panel.catalog(), panel.config.consensus_method);
    verdict.evaluation_time_secs = started.elapsed().as_secs_f64();
    debug!(
        overall = verdict.overall_score,
        contributing = verdict.contributing_judge_count,
        judges = verdict.judge_identities.len(),
        "sample evaluated"
    );
    verdict
}
