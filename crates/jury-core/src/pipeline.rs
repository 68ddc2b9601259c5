//! Drives judging for a batch of samples.
//!
//! Samples are judged concurrently (bounded by `parallel_samples`), each on
//! its own task. Finished samples come back through the `JoinSet` and only
//! this driver appends them to the aggregator, in input order.

use crate::aggregate::SampleAggregator;
use crate::judge::penalties::{apply_penalties, PenaltyConfig};
use crate::judge::JudgePanel;
use crate::model::{RecoveryStrategyKind, Sample, SampleInput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// What happened during a run, beyond the averaged numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCounts {
    pub samples_total: usize,
    pub samples_judged: usize,
    /// Never dispatched because the run was cancelled.
    pub samples_skipped: usize,
    /// Sample tasks that panicked; no sample is recorded for them.
    pub samples_failed: usize,
    /// At least one opinion came from a recovery fallback or neutral scores.
    pub samples_with_fallback: usize,
    /// Every judge failed; the verdict is neutral.
    pub samples_without_contributors: usize,
    pub judge_calls: usize,
    pub judge_failures: usize,
    pub contributing_judges: usize,
    pub parser_fallbacks: BTreeMap<RecoveryStrategyKind, usize>,
}

impl RunCounts {
    fn record(&mut self, sample: &Sample) {
        let verdict = &sample.verdict;
        self.samples_judged += 1;
        self.judge_calls += verdict.opinions.len();
        self.judge_failures += verdict.failed_judge_count();
        self.contributing_judges += verdict.contributing_judge_count;
        if verdict.contributing_judge_count == 0 {
            self.samples_without_contributors += 1;
        }
        if verdict.fallback_count() > 0 {
            self.samples_with_fallback += 1;
        }
        for op in verdict.opinions.iter().filter(|o| o.used_fallback()) {
            *self.parser_fallbacks.entry(op.recovery).or_default() += 1;
        }
    }

    pub fn total_fallbacks(&self) -> usize {
        self.parser_fallbacks.values().sum()
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub aggregator: SampleAggregator,
    pub counts: RunCounts,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct BenchmarkRunner {
    panel: JudgePanel,
    penalties: Arc<PenaltyConfig>,
    parallel_samples: usize,
}

impl BenchmarkRunner {
    pub fn new(panel: JudgePanel, penalties: PenaltyConfig) -> Self {
        Self {
            panel,
            penalties: Arc::new(penalties),
            parallel_samples: 4,
        }
    }

    pub fn with_parallel_samples(mut self, n: usize) -> Self {
        self.parallel_samples = n.max(1);
        self
    }

    /// Judge every input. Cancellation stops new dispatches; samples already
    /// in flight finish (or time out) and are kept.
    pub async fn run(
        &self,
        inputs: Vec<SampleInput>,
        mut cancel: watch::Receiver<bool>,
    ) -> anyhow::Result<RunOutcome> {
        let total = inputs.len();
        info!(
            samples = total,
            judges = self.panel.config().judges.len(),
            parallel = self.parallel_samples,
            "starting judging run"
        );

        let sem = Arc::new(Semaphore::new(self.parallel_samples));
        let mut join_set = JoinSet::new();
        let mut dispatched = 0usize;
        let mut cancelled = false;

        for (idx, input) in inputs.into_iter().enumerate() {
            if *cancel.borrow() {
                cancelled = true;
                break;
            }
            let permit = tokio::select! {
                biased;
                _ = wait_for_cancel(&mut cancel) => {
                    cancelled = true;
                    break;
                }
                permit = sem.clone().acquire_owned() => permit?,
            };

            let panel = self.panel.clone();
            let penalties = self.penalties.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let mut verdict = panel
                    .evaluate(&input.generated_text, &input.prompt, &input.sampler_config)
                    .await;
                apply_penalties(&mut verdict, &input.generated_text, &penalties);
                (idx, input.into_sample(verdict))
            });
            dispatched += 1;
        }

        if cancelled {
            warn!(
                dispatched,
                skipped = total - dispatched,
                "run cancelled; waiting for in-flight samples"
            );
        }

        let mut finished: Vec<(usize, Sample)> = Vec::with_capacity(dispatched);
        let mut counts = RunCounts {
            samples_total: total,
            samples_skipped: total - dispatched,
            ..RunCounts::default()
        };
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((idx, sample)) => {
                    debug!(
                        sample_id = %sample.sample_id,
                        sampler = %sample.sampler_name,
                        score = sample.verdict.overall_score,
                        "sample judged"
                    );
                    finished.push((idx, sample));
                }
                Err(e) => {
                    warn!(error = %e, "sample task failed");
                    counts.samples_failed += 1;
                }
            }
        }

        // Input order, so statistics do not depend on completion order.
        finished.sort_by_key(|(idx, _)| *idx);
        let mut aggregator = SampleAggregator::new();
        for (_, sample) in finished {
            counts.record(&sample);
            aggregator.add_sample(sample);
        }

        info!(
            judged = counts.samples_judged,
            skipped = counts.samples_skipped,
            judge_failures = counts.judge_failures,
            fallbacks = counts.total_fallbacks(),
            "judging run finished"
        );

        Ok(RunOutcome {
            aggregator,
            counts,
            cancelled,
        })
    }
}

/// Resolves once the flag is true. A dropped sender means no cancellation.
async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::analyze;
    use crate::criteria::CriterionCatalog;
    use crate::errors::JudgeError;
    use crate::judge::{JudgeIdentity, JudgePanelConfig};
    use crate::model::SamplerConfig;
    use crate::providers::llm::FakeClient;
    use std::time::Duration;

    const EIGHT: &str = r#"{"criterion_scores": {"engagement": {"score": 8, "reasoning": "good"}}, "overall_score": 8.0, "summary": "good"}"#;

    fn input(prompt: &str, sampler: &str, repetition: u32) -> SampleInput {
        SampleInput {
            prompt: prompt.to_string(),
            sampler_name: sampler.to_string(),
            sampler_config: SamplerConfig::new().with("temperature", 0.7).with("type", sampler),
            generated_text: format!("story {} {}", sampler, repetition),
            repetition_index: repetition,
        }
    }

    fn runner(judges: &[&str], client: FakeClient, timeout: Duration) -> BenchmarkRunner {
        let cfg = JudgePanelConfig::new(judges.iter().map(|j| JudgeIdentity::new(*j)).collect())
            .with_timeout(timeout);
        let panel =
            JudgePanel::new(cfg, CriterionCatalog::creative_writing(), Arc::new(client)).unwrap();
        BenchmarkRunner::new(panel, PenaltyConfig::default()).with_parallel_samples(2)
    }

    #[tokio::test]
    async fn single_judge_constant_score_end_to_end() {
        let r = runner(
            &["judge"],
            FakeClient::new().with_default_response(EIGHT),
            Duration::from_secs(5),
        );
        let (_tx, rx) = watch::channel(false);
        let out = r
            .run(vec![input("p", "greedy", 0), input("p", "greedy", 1)], rx)
            .await
            .unwrap();

        assert!(!out.cancelled);
        assert_eq!(out.counts.samples_judged, 2);
        let report = out.aggregator.compute().unwrap();
        let greedy = report.sampler("greedy").unwrap();
        assert_eq!(greedy.overall_mean, 8.0);
        assert_eq!(greedy.overall_std, 0.0);
        assert_eq!(greedy.prompt_consistency, 1.0);
    }

    #[tokio::test]
    async fn unstructured_judge_text_is_counted_as_fallback() {
        let r = runner(
            &["chatty"],
            FakeClient::new().with_default_response("The score is definitely around 7/10, great job!"),
            Duration::from_secs(5),
        );
        let (_tx, rx) = watch::channel(false);
        let out = r.run(vec![input("p", "x", 0)], rx).await.unwrap();

        let sample = &out.aggregator.samples()[0];
        assert_eq!(sample.verdict.overall_score, 7.0);
        assert!(sample
            .verdict
            .per_criterion
            .iter()
            .all(|c| c.mean_score == 7.0
                && c.individual_reasoning[0].contains("unstructured text")));
        assert_eq!(out.counts.samples_with_fallback, 1);
        assert_eq!(
            out.counts.parser_fallbacks.get(&RecoveryStrategyKind::ScoreMentions),
            Some(&1)
        );
    }

    #[tokio::test]
    async fn timed_out_judge_is_excluded_but_run_completes() {
        let client = FakeClient::new()
            .with_default_response(EIGHT)
            .with_delay("slow", Duration::from_secs(30));
        let r = runner(&["fast", "slow"], client, Duration::from_millis(100));
        let (_tx, rx) = watch::channel(false);
        let out = r
            .run(vec![input("p", "a", 0), input("p", "b", 0)], rx)
            .await
            .unwrap();

        assert_eq!(out.counts.samples_judged, 2);
        assert_eq!(out.counts.judge_calls, 4);
        assert_eq!(out.counts.judge_failures, 2);
        assert_eq!(out.counts.contributing_judges, 2);
        for s in out.aggregator.samples() {
            assert_eq!(s.verdict.contributing_judge_count, 1);
            let slow = &s.verdict.opinions[1];
            assert!(slow.error.is_some());
            assert!(slow.per_criterion.values().all(|c| c.score == 5.0));
        }
        let verdict = analyze(&out.aggregator.compute().unwrap()).unwrap();
        assert_eq!(verdict.sampler_stats.len(), 2);
    }

    #[tokio::test]
    async fn all_judges_failing_is_reported() {
        let client = FakeClient::new().with_failure(
            "only",
            JudgeError::Unauthorized {
                message: "bad key".into(),
            },
        );
        let r = runner(&["only"], client, Duration::from_secs(5));
        let (_tx, rx) = watch::channel(false);
        let out = r.run(vec![input("p", "a", 0)], rx).await.unwrap();
        assert_eq!(out.counts.samples_without_contributors, 1);
        assert_eq!(out.counts.judge_failures, 1);
        assert_eq!(out.aggregator.samples()[0].verdict.overall_score, 5.0);
    }

    #[tokio::test]
    async fn cancelled_before_start_dispatches_nothing() {
        let r = runner(&["j"], FakeClient::new(), Duration::from_secs(5));
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let out = r
            .run(vec![input("p", "a", 0), input("p", "a", 1)], rx)
            .await
            .unwrap();
        assert!(out.cancelled);
        assert_eq!(out.counts.samples_skipped, 2);
        assert!(out.aggregator.is_empty());
        assert!(out.aggregator.compute().is_err());
    }

    #[tokio::test]
    async fn cancellation_mid_run_keeps_in_flight_samples() {
        let client = FakeClient::new()
            .with_default_response(EIGHT)
            .with_delay("j", Duration::from_millis(200));
        let r = runner(&["j"], client, Duration::from_secs(5)).with_parallel_samples(1);
        let (tx, rx) = watch::channel(false);
        let inputs: Vec<_> = (0..5).map(|i| input("p", "a", i)).collect();

        let handle = tokio::spawn(async move { r.run(inputs, rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        let out = handle.await.unwrap().unwrap();

        assert!(out.cancelled);
        assert!(out.counts.samples_judged >= 1);
        assert!(out.counts.samples_skipped >= 1);
        assert_eq!(
            out.counts.samples_judged + out.counts.samples_skipped,
            out.counts.samples_total
        );
    }

    #[tokio::test]
    async fn samples_keep_input_order() {
        let client = FakeClient::new()
            .with_default_response(EIGHT)
            .with_delay("j", Duration::from_millis(5));
        let r = runner(&["j"], client, Duration::from_secs(5)).with_parallel_samples(4);
        let (_tx, rx) = watch::channel(false);
        let inputs: Vec<_> = (0..6).map(|i| input("p", "a", i)).collect();
        let out = r.run(inputs, rx).await.unwrap();
        let reps: Vec<u32> = out
            .aggregator
            .samples()
            .iter()
            .map(|s| s.repetition_index)
            .collect();
        assert_eq!(reps, vec![0, 1, 2, 3, 4, 5]);
    }
}
