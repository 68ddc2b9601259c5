use crate::errors::JudgeError;
use crate::judge::recovery::RecoveryParser;
use crate::model::{RawJudgeOpinion, RecoveryStrategyKind};
use crate::providers::llm::{JudgeClient, JudgeRequest};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Calls one judge and always returns an opinion.
pub(crate) async fn call_judge_impl(
    client: &dyn JudgeClient,
    parser: &RecoveryParser,
    request: &JudgeRequest,
    limit: Duration,
) -> RawJudgeOpinion {
    let judge = request.judge.as_str();
    let result = match timeout(limit, client.send(request)).await {
        Ok(res) => res,
        Err(_) => Err(JudgeError::Timeout { elapsed: limit }),
    };

    match result {
        Ok(resp) => {
            debug!(judge = %judge, chars = resp.text.len(), "judge response received");
            parser.parse(judge, &resp.text)
        }
        Err(e) => {
            warn!(judge = %judge, error = %e, "judge call failed");
            failure_opinion(judge, parser, e.to_string())
        }
    }
}

pub(crate) fn failure_opinion(
    judge: &str,
    parser: &RecoveryParser,
    error: impl Into<String>,
) -> RawJudgeOpinion {
    RawJudgeOpinion::neutral(
        judge,
        parser.catalog(),
        error,
        RecoveryStrategyKind::JudgeFailure,
    )
}
