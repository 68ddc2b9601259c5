mod judge_internal;
pub mod consensus;
pub mod penalties;
pub mod prompt;
pub mod recovery;

use crate::criteria::CriterionCatalog;
use crate::errors::ConfigError;
use crate::model::{EvaluationVerdict, RawJudgeOpinion, SamplerConfig};
use crate::providers::llm::JudgeClient;
use consensus::ConsensusMethod;
use recovery::RecoveryParser;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on concurrent judge calls for one sample.
pub const MAX_JUDGE_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeIdentity {
    pub model: String,
    /// Force schema-validated output on or off; `None` uses the known-model list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<bool>,
}

impl JudgeIdentity {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            structured_output: None,
        }
    }

    pub fn uses_structured_output(&self) -> bool {
        self.structured_output
            .unwrap_or_else(|| prompt::supports_structured_output(&self.model))
    }
}

#[derive(Clone, Debug)]
pub struct JudgePanelConfig {
    pub judges: Vec<JudgeIdentity>,
    pub consensus_method: ConsensusMethod,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per judge call, covering the client's own retries.
    pub timeout: Duration,
    pub max_concurrency: usize,
}

impl JudgePanelConfig {
    pub fn new(judges: Vec<JudgeIdentity>) -> Self {
        Self {
            judges,
            consensus_method: ConsensusMethod::Average,
            temperature: 0.3,
            max_tokens: 1500,
            timeout: Duration::from_secs(120),
            max_concurrency: MAX_JUDGE_CONCURRENCY,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `min(judges, max_concurrency, MAX_JUDGE_CONCURRENCY)`, at least 1.
    pub fn effective_concurrency(&self) -> usize {
        self.judges
            .len()
            .min(self.max_concurrency)
            .min(MAX_JUDGE_CONCURRENCY)
            .max(1)
    }
}

/// A configured set of judges sharing one client and one criterion catalog.
/// Cheap to clone; the pipeline hands one clone to every sample task.
#[derive(Clone)]
pub struct JudgePanel {
    config: Arc<JudgePanelConfig>,
    parser: Arc<RecoveryParser>,
    client: Arc<dyn JudgeClient>,
}

impl std::fmt::Debug for JudgePanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgePanel")
            .field("config", &self.config)
            .field("provider", &self.client.provider_name())
            .finish()
    }
}

impl JudgePanel {
    pub fn new(
        config: JudgePanelConfig,
        catalog: CriterionCatalog,
        client: Arc<dyn JudgeClient>,
    ) -> Result<Self, ConfigError> {
        Self::with_parser(config, RecoveryParser::new(catalog), client)
    }

    pub fn with_parser(
        config: JudgePanelConfig,
        parser: RecoveryParser,
        client: Arc<dyn JudgeClient>,
    ) -> Result<Self, ConfigError> {
        if config.judges.is_empty() {
            return Err(ConfigError::NoJudges);
        }
        if config.max_concurrency == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "max_concurrency".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(Self {
            config: Arc::new(config),
            parser: Arc::new(parser),
            client,
        })
    }

    pub fn config(&self) -> &JudgePanelConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CriterionCatalog {
        self.parser.catalog()
    }

    /// One opinion per configured judge, in configuration order. Failures are
    /// folded into neutral opinions with `error` set; this never fails.
    pub async fn dispatch(
        &self,
        text: &str,
        prompt: &str,
        sampler_config: &SamplerConfig,
    ) -> Vec<RawJudgeOpinion> {
        judge_internal::run::dispatch_impl(self, text, prompt, sampler_config).await
    }

    /// Dispatch plus consensus.
    pub async fn evaluate(
        &self,
        text: &str,
        prompt: &str,
        sampler_config: &SamplerConfig,
    ) -> EvaluationVerdict {
        judge_internal::run::evaluate_impl(self, text, prompt, sampler_config).await
    }
}
