//! Judge client boundary.
//!
//! The core only needs one textual response per request, or a typed failure.
//! Whether the judge is hosted locally or remotely is the client's business.

pub mod fake;
pub mod openai;

use crate::errors::JudgeError;
use async_trait::async_trait;

pub use fake::FakeClient;
pub use openai::{OpenAiCompatClient, OpenAiCompatConfig};

/// One evaluation request addressed to one judge identity.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeRequest {
    /// Judge model identifier, e.g. `openai/gpt-4o`.
    pub judge: String,
    pub system_prompt: String,
    pub user_prompt: String,
    /// JSON schema to request schema-validated output; `None` means free text.
    pub response_schema: Option<serde_json::Value>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JudgeResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
}

#[async_trait]
pub trait JudgeClient: Send + Sync {
    async fn send(&self, request: &JudgeRequest) -> Result<JudgeResponse, JudgeError>;
    fn provider_name(&self) -> &'static str;
}
