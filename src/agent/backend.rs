//! Chat backends: the remote side of a conversational run.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::wire::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// One completion round-trip. Separated from the agent loop so tests can script
/// responses without a network.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;
    fn name(&self) -> &'static str;
}

/// OpenAI-compatible `/chat/completions` endpoint with function tools.
pub struct OpenAiBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .user_agent("channel-intel/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        if self.api_key.is_empty() {
            return Err(AgentError::MissingApiKey);
        }
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %request.model, messages = request.messages.len(), "agent chat request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Status { status, body });
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| AgentError::Malformed(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
