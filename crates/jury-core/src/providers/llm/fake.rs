use super::{JudgeClient, JudgeRequest, JudgeResponse};
use crate::criteria::CriterionCatalog;
use crate::errors::JudgeError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(JudgeError),
}

/// Scripted judge client for tests and offline runs.
///
/// Replies are keyed by judge model; judges without a script get the default
/// response. Every request is recorded.
#[derive(Debug)]
pub struct FakeClient {
    default_response: String,
    replies: HashMap<String, Reply>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<JudgeRequest>>,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            default_response: r#"{"overall_score": 7.0, "summary": "fake judge"}"#.to_string(),
            replies: HashMap::new(),
            delays: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every judge answers with a well-formed record scoring each criterion `score`.
    pub fn uniform(catalog: &CriterionCatalog, score: f64) -> Self {
        let criteria: serde_json::Map<String, serde_json::Value> = catalog
            .names()
            .map(|n| {
                (
                    n.to_string(),
                    serde_json::json!({"score": score, "reasoning": "fake judge"}),
                )
            })
            .collect();
        let body = serde_json::json!({
            "criterion_scores": criteria,
            "overall_score": score,
            "summary": "fake judge",
        });
        Self::new().with_default_response(body.to_string())
    }

    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    pub fn with_response(mut self, judge: impl Into<String>, response: impl Into<String>) -> Self {
        self.replies
            .insert(judge.into(), Reply::Text(response.into()));
        self
    }

    pub fn with_failure(mut self, judge: impl Into<String>, error: JudgeError) -> Self {
        self.replies.insert(judge.into(), Reply::Fail(error));
        self
    }

    /// Sleep before answering; pairs with the dispatcher timeout in tests.
    pub fn with_delay(mut self, judge: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(judge.into(), delay);
        self
    }

    pub fn requests(&self) -> Vec<JudgeRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl JudgeClient for FakeClient {
    async fn send(&self, request: &JudgeRequest) -> Result<JudgeResponse, JudgeError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }

        if let Some(delay) = self.delays.get(&request.judge) {
            tokio::time::sleep(*delay).await;
        }

        let text = match self.replies.get(&request.judge) {
            Some(Reply::Fail(e)) => return Err(e.clone()),
            Some(Reply::Text(t)) => t.clone(),
            None => self.default_response.clone(),
        };

        Ok(JudgeResponse {
            text,
            provider: "fake".to_string(),
            model: request.judge.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
