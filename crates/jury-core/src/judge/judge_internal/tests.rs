use crate::criteria::CriterionCatalog;
use crate::errors::JudgeError;
use crate::judge::{JudgeIdentity, JudgePanel, JudgePanelConfig};
use crate::model::{RecoveryStrategyKind, SamplerConfig, NEUTRAL_SCORE};
use crate::providers::llm::{FakeClient, JudgeClient, JudgeRequest, JudgeResponse};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn record(overall: f64) -> String {
    format!(
        r#"{{"criterion_scores": {{"narrative_structure": {{"score": {o}, "reasoning": "ok"}}, "engagement": {{"score": {o}, "reasoning": "ok"}}}}, "overall_score": {o}, "summary": "fine"}}"#,
        o = overall
    )
}

fn panel(judges: &[&str], client: Arc<dyn JudgeClient>, timeout: Duration) -> JudgePanel {
    let cfg = JudgePanelConfig::new(judges.iter().map(|j| JudgeIdentity::new(*j)).collect())
        .with_timeout(timeout);
    JudgePanel::new(cfg, CriterionCatalog::creative_writing(), client).unwrap()
}

fn sampler() -> SamplerConfig {
    SamplerConfig::new().with("temperature", 0.8).with("type", "min_p")
}

#[test]
fn empty_panel_is_rejected() {
    let err = JudgePanel::new(
        JudgePanelConfig::new(vec![]),
        CriterionCatalog::creative_writing(),
        Arc::new(FakeClient::new()),
    )
    .unwrap_err();
    assert_eq!(err, crate::errors::ConfigError::NoJudges);
}

#[test]
fn concurrency_is_capped() {
    let judges: Vec<_> = (0..8).map(|i| JudgeIdentity::new(format!("j{}", i))).collect();
    assert_eq!(JudgePanelConfig::new(judges).effective_concurrency(), 5);
    let two = vec![JudgeIdentity::new("a"), JudgeIdentity::new("b")];
    assert_eq!(JudgePanelConfig::new(two).effective_concurrency(), 2);
}

#[tokio::test]
async fn three_judges_reach_consensus() {
    let client = FakeClient::new()
        .with_response("a", record(6.0))
        .with_response("b", record(7.0))
        .with_response("c", record(8.0));
    let p = panel(&["a", "b", "c"], Arc::new(client), Duration::from_secs(5));

    let v = p.evaluate("text", "prompt", &sampler()).await;
    assert!((v.overall_score - 7.0).abs() < 1e-12);
    assert!((v.overall_std - 0.816).abs() < 1e-3);
    let c = &v.per_criterion[0];
    assert!((c.consensus_strength - 0.883).abs() < 1e-3);
    assert_eq!(v.contributing_judge_count, 3);
    assert!(v.evaluation_time_secs >= 0.0);
}

#[tokio::test]
async fn opinions_follow_configuration_order() {
    // `a` answers last but still comes first.
    let client = FakeClient::new()
        .with_response("a", record(4.0))
        .with_delay("a", Duration::from_millis(50))
        .with_response("b", record(9.0));
    let p = panel(&["a", "b"], Arc::new(client), Duration::from_secs(5));

    let ops = p.dispatch("text", "prompt", &sampler()).await;
    let judges: Vec<_> = ops.iter().map(|o| o.judge.as_str()).collect();
    assert_eq!(judges, vec!["a", "b"]);
    assert_eq!(ops[0].overall_score, 4.0);
}

#[tokio::test]
async fn timed_out_judge_becomes_neutral_failure() {
    let client = FakeClient::new()
        .with_response("fast", record(8.0))
        .with_delay("slow", Duration::from_secs(30));
    let p = panel(&["fast", "slow"], Arc::new(client), Duration::from_millis(100));

    let v = p.evaluate("text", "prompt", &sampler()).await;
    let slow = &v.opinions[1];
    assert_eq!(slow.recovery, RecoveryStrategyKind::JudgeFailure);
    assert!(slow.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(slow.per_criterion.len(), 5);
    assert!(slow.per_criterion.values().all(|c| c.score == NEUTRAL_SCORE));

    assert_eq!(v.contributing_judge_count, 1);
    assert_eq!(v.judge_identities.len(), 2);
    assert_eq!(v.overall_score, 8.0);
}

#[tokio::test]
async fn client_errors_do_not_abort_other_judges() {
    let client = FakeClient::new()
        .with_failure(
            "down",
            JudgeError::Server {
                status: 503,
                message: "overloaded".into(),
            },
        )
        .with_response("up", record(6.0));
    let p = panel(&["down", "up"], Arc::new(client), Duration::from_secs(5));

    let ops = p.dispatch("text", "prompt", &sampler()).await;
    assert_eq!(ops.len(), 2);
    assert!(ops[0].error.as_deref().unwrap().contains("503"));
    assert!(ops[1].error.is_none());
}

struct PanickingClient;

#[async_trait]
impl JudgeClient for PanickingClient {
    async fn send(&self, request: &JudgeRequest) -> Result<JudgeResponse, JudgeError> {
        if request.judge == "boom" {
            panic!("judge client bug");
        }
        Ok(JudgeResponse {
            text: record(7.0),
            provider: "test".into(),
            model: request.judge.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "test"
    }
}

#[tokio::test]
async fn panicking_task_still_yields_an_opinion() {
    let p = panel(&["boom", "fine"], Arc::new(PanickingClient), Duration::from_secs(5));
    let ops = p.dispatch("text", "prompt", &sampler()).await;
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].judge, "boom");
    assert!(ops[0].is_failure());
    assert_eq!(ops[1].overall_score, 7.0);
}

struct CountingClient {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl JudgeClient for CountingClient {
    async fn send(&self, request: &JudgeRequest) -> Result<JudgeResponse, JudgeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(JudgeResponse {
            text: record(5.0),
            provider: "test".into(),
            model: request.judge.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "test"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fan_out_respects_concurrency_cap() {
    let client = Arc::new(CountingClient {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let names: Vec<String> = (0..8).map(|i| format!("j{}", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let p = panel(&refs, client.clone(), Duration::from_secs(5));

    let ops = p.dispatch("text", "prompt", &sampler()).await;
    assert_eq!(ops.len(), 8);
    assert!(client.peak.load(Ordering::SeqCst) <= 5);
}

#[tokio::test]
async fn structured_output_only_for_capable_judges() {
    let client = Arc::new(FakeClient::new());
    let p = panel(
        &["openai/gpt-4o", "meta-llama/llama-3-8b"],
        client.clone(),
        Duration::from_secs(5),
    );
    p.dispatch("Once upon a time", "Write a fable", &sampler()).await;

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    let by_judge = |name: &str| requests.iter().find(|r| r.judge == name).unwrap().clone();
    assert!(by_judge("openai/gpt-4o").response_schema.is_some());
    let free = by_judge("meta-llama/llama-3-8b");
    assert!(free.response_schema.is_none());
    assert!(free.user_prompt.contains("Write a fable"));
    assert!(free.user_prompt.contains("Temperature: 0.8, Sampler: min_p"));
}
