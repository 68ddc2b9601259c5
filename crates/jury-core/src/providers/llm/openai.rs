//! OpenAI-compatible chat-completions judge client (OpenRouter by default).
//!
//! Status mapping and retry live here; the dispatcher never retries.

use super::{JudgeClient, JudgeRequest, JudgeResponse};
use crate::errors::JudgeError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT_VALUE: &str = concat!("jury/", env!("CARGO_PKG_VERSION"));
const SCHEMA_NAME: &str = "sample_evaluation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiCompatConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-attempt HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries for rate limits, 5xx and transport errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base for exponential backoff between retries.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_ms() -> u64 {
    500
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

impl OpenAiCompatConfig {
    /// Reads `JURY_JUDGE_BASE_URL` and the API key from `api_key_env`
    /// (falling back to `OPENROUTER_API_KEY`).
    pub fn from_env(api_key_env: Option<&str>) -> Self {
        let key_var = api_key_env.unwrap_or("OPENROUTER_API_KEY");
        Self {
            base_url: std::env::var("JURY_JUDGE_BASE_URL").unwrap_or_else(|_| default_base_url()),
            api_key: std::env::var(key_var).ok().filter(|k| !k.trim().is_empty()),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_base_ms = retry_base_ms;
        self
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, JudgeError> {
        let api_key = config.api_key.clone().ok_or_else(|| JudgeError::Config {
            message: "judge API key not set (OPENROUTER_API_KEY or judge.api_key_env)"
                .to_string(),
        })?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| JudgeError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            api_key,
            config,
        })
    }

    fn request_body(request: &JudgeRequest) -> serde_json::Value {
        let mut body = json!({
            "model": request.judge,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if let Some(schema) = &request.response_schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": SCHEMA_NAME,
                    "strict": true,
                    "schema": schema,
                }
            });
        }
        body
    }

    fn backoff(&self, err: &JudgeError, attempt: u32) -> Duration {
        use rand::Rng;

        match err {
            JudgeError::RateLimited {
                retry_after: Some(retry_after),
            } => {
                let capped = (*retry_after).min(Duration::from_secs(30));
                let jitter: f64 = rand::thread_rng().gen_range(0.9_f64..=1.1_f64);
                Duration::from_millis(((capped.as_millis() as f64) * jitter).round() as u64)
            }
            _ => {
                let base = self
                    .config
                    .retry_base_ms
                    .saturating_mul(1u64 << attempt.min(6))
                    .min(30_000);
                let jittered = rand::thread_rng().gen_range(base / 2..=base.max(1));
                Duration::from_millis(jittered)
            }
        }
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<String, JudgeError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    JudgeError::Timeout {
                        elapsed: Duration::from_secs(self.config.timeout_secs),
                    }
                } else {
                    JudgeError::from(e)
                }
            })?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {}
            401 | 403 => {
                return Err(JudgeError::Unauthorized {
                    message: response
                        .text()
                        .await
                        .unwrap_or_else(|_| status.to_string()),
                })
            }
            429 => {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                return Err(JudgeError::RateLimited { retry_after });
            }
            500..=599 => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| status.to_string());
                return Err(JudgeError::Server {
                    status: status.as_u16(),
                    message,
                });
            }
            _ => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| status.to_string());
                return Err(JudgeError::Http {
                    status: status.as_u16(),
                    message,
                });
            }
        }

        let envelope: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| JudgeError::InvalidResponse {
                    message: format!("response body is not JSON: {}", e),
                })?;

        envelope
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| JudgeError::InvalidResponse {
                message: "response missing choices[0].message.content".to_string(),
            })
    }
}

#[async_trait]
impl JudgeClient for OpenAiCompatClient {
    async fn send(&self, request: &JudgeRequest) -> Result<JudgeResponse, JudgeError> {
        let body = Self::request_body(request);
        let mut retries = 0;

        loop {
            match self.send_once(&body).await {
                Ok(text) => {
                    debug!(judge = %request.judge, retries, "judge responded");
                    return Ok(JudgeResponse {
                        text,
                        provider: self.provider_name().to_string(),
                        model: request.judge.clone(),
                    });
                }
                Err(e) if e.is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    let backoff = self.backoff(&e, retries);
                    warn!(
                        judge = %request.judge,
                        error = %e,
                        retry = retries,
                        max_retries = self.config.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "retrying judge request"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "openai-compat"
    }
}
