//! YAML configuration for a judging run.
//!
//! ```yaml
//! benchmark_name: creative-writing
//! model_name: llama-3.1-8b
//! parallel_samples: 4
//! judge:
//!   models:
//!     - model: openai/gpt-4o
//!     - model: anthropic/claude-3.5-sonnet
//!   timeout_secs: 120
//! penalties:
//!   enabled: true
//!   empty_generation: { penalty: -3.0 }
//! ```

use crate::criteria::{Criterion, CriterionCatalog};
use crate::errors::ConfigError;
use crate::judge::consensus::ConsensusMethod;
use crate::judge::penalties::PenaltyConfig;
use crate::judge::{JudgeIdentity, JudgePanelConfig, MAX_JUDGE_CONCURRENCY};
use crate::providers::llm::OpenAiCompatConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Any OpenAI-compatible chat completions endpoint (OpenRouter by default).
    #[default]
    OpenaiCompat,
    /// Offline scripted judge; every criterion gets the same score.
    Fake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeSettings {
    pub provider: ProviderKind,
    pub base_url: Option<String>,
    /// Env var holding the API key; `OPENROUTER_API_KEY` when unset.
    pub api_key_env: Option<String>,
    pub models: Vec<JudgeIdentity>,
    /// Kept as a string so unknown names surface as a config error, not a YAML one.
    pub consensus_method: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_concurrency: usize,
    pub max_retries: u32,
    /// Score the fake provider gives every criterion.
    pub fake_score: f64,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: None,
            api_key_env: None,
            models: Vec::new(),
            consensus_method: ConsensusMethod::Average.as_str().to_string(),
            temperature: 0.3,
            max_tokens: 1500,
            timeout_secs: 120,
            max_concurrency: MAX_JUDGE_CONCURRENCY,
            max_retries: 2,
            fake_score: 7.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub benchmark_name: String,
    pub model_name: String,
    /// Custom rubric; the creative-writing catalog when absent.
    pub criteria: Option<Vec<Criterion>>,
    pub judge: JudgeSettings,
    pub parallel_samples: usize,
    pub penalties: PenaltyConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            benchmark_name: "benchmark".to_string(),
            model_name: "unknown".to_string(),
            criteria: None,
            judge: JudgeSettings::default(),
            parallel_samples: 4,
            penalties: PenaltyConfig::default(),
        }
    }
}

impl BenchConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let cfg: BenchConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.catalog()?;
        self.consensus_method()?;
        if self.judge.models.is_empty() {
            return Err(ConfigError::NoJudges);
        }
        if self.judge.max_concurrency == 0 {
            return Err(invalid("judge.max_concurrency", "must be at least 1"));
        }
        if self.judge.timeout_secs == 0 {
            return Err(invalid("judge.timeout_secs", "must be at least 1"));
        }
        if self.parallel_samples == 0 {
            return Err(invalid("parallel_samples", "must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.judge.temperature) {
            return Err(invalid("judge.temperature", "expected a value in [0, 2]"));
        }
        self.penalties.validate()
    }

    pub fn catalog(&self) -> Result<CriterionCatalog, ConfigError> {
        match &self.criteria {
            Some(list) => CriterionCatalog::new(list.clone()),
            None => Ok(CriterionCatalog::creative_writing()),
        }
    }

    pub fn consensus_method(&self) -> Result<ConsensusMethod, ConfigError> {
        self.judge.consensus_method.parse()
    }

    pub fn panel_config(&self) -> Result<JudgePanelConfig, ConfigError> {
        let mut cfg = JudgePanelConfig::new(self.judge.models.clone())
            .with_timeout(Duration::from_secs(self.judge.timeout_secs));
        cfg.consensus_method = self.consensus_method()?;
        cfg.temperature = self.judge.temperature;
        cfg.max_tokens = self.judge.max_tokens;
        cfg.max_concurrency = self.judge.max_concurrency;
        Ok(cfg)
    }

    /// HTTP client settings. The per-attempt timeout matches the per-call one.
    pub fn client_config(&self) -> OpenAiCompatConfig {
        let mut cfg = OpenAiCompatConfig::from_env(self.judge.api_key_env.as_deref())
            .with_timeout_secs(self.judge.timeout_secs);
        cfg.max_retries = self.judge.max_retries;
        if let Some(url) = &self.judge.base_url {
            cfg = cfg.with_base_url(url.clone());
        }
        cfg
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
benchmark_name: stories
model_name: llama
judge:
  models:
    - model: openai/gpt-4o
    - model: local/judge
      structured_output: false
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg: BenchConfig = serde_yaml::from_str(MINIMAL).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.parallel_samples, 4);
        assert_eq!(cfg.judge.provider, ProviderKind::OpenaiCompat);
        assert_eq!(cfg.catalog().unwrap().len(), CriterionCatalog::creative_writing().len());

        let panel = cfg.panel_config().unwrap();
        assert_eq!(panel.judges.len(), 2);
        assert_eq!(panel.timeout, Duration::from_secs(120));
        assert_eq!(panel.consensus_method, ConsensusMethod::Average);
        assert!(panel.judges[0].uses_structured_output());
        assert!(!panel.judges[1].uses_structured_output());
    }

    #[test]
    fn custom_criteria_and_penalties() {
        let yaml = r#"
judge:
  provider: fake
  models: [{model: j}]
  consensus_method: mean
criteria:
  - {name: clarity, description: "Is it clear?", weight: 0.6}
  - {name: humor, description: "Is it funny?", weight: 0.4}
penalties:
  enabled: true
  empty_generation: {penalty: -3.0}
"#;
        let cfg: BenchConfig = serde_yaml::from_str(yaml).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.judge.provider, ProviderKind::Fake);
        let names: Vec<_> = cfg.catalog().unwrap().names().map(String::from).collect();
        assert_eq!(names, vec!["clarity", "humor"]);
        assert!(cfg.penalties.enabled);
        assert_eq!(cfg.consensus_method().unwrap(), ConsensusMethod::Average);
    }

    #[test]
    fn validation_errors() {
        let mut cfg: BenchConfig = serde_yaml::from_str(MINIMAL).unwrap();
        cfg.judge.consensus_method = "median".into();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UnknownConsensusMethod { .. })
        ));

        let mut cfg: BenchConfig = serde_yaml::from_str(MINIMAL).unwrap();
        cfg.judge.models.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::NoJudges));

        let mut cfg: BenchConfig = serde_yaml::from_str(MINIMAL).unwrap();
        cfg.parallel_samples = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidSetting { ref field, .. }) if field == "parallel_samples"
        ));

        let mut cfg: BenchConfig = serde_yaml::from_str(MINIMAL).unwrap();
        cfg.criteria = Some(vec![]);
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyCatalog));
    }

    #[test]
    fn positive_penalty_is_rejected() {
        let yaml = format!(
            "{}penalties:\n  enabled: true\n  empty_generation: {{penalty: 4.0}}\n",
            MINIMAL
        );
        let cfg: BenchConfig = serde_yaml::from_str(&yaml).unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidSetting { ref field, .. }) if field == "penalties.empty_generation.penalty"
        ));

        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
        let err = BenchConfig::load(f.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("must be zero or negative"));
    }

    #[test]
    fn load_reports_path_in_errors() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"judge: [not, a, map]").unwrap();
        let err = BenchConfig::load(f.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to parse config"));

        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(MINIMAL.as_bytes()).unwrap();
        let cfg = BenchConfig::load(f.path()).unwrap();
        assert_eq!(cfg.benchmark_name, "stories");
    }

    #[test]
    fn client_config_uses_judge_settings() {
        let mut cfg: BenchConfig = serde_yaml::from_str(MINIMAL).unwrap();
        cfg.judge.base_url = Some("http://localhost:9999/v1".into());
        cfg.judge.api_key_env = Some("JURY_TEST_UNSET_KEY_VAR".into());
        cfg.judge.max_retries = 5;
        let client = cfg.client_config();
        assert_eq!(client.base_url, "http://localhost:9999/v1");
        assert_eq!(client.max_retries, 5);
        assert_eq!(client.timeout_secs, 120);
        assert!(client.api_key.is_none());
    }
}
