//! OpenAI chat completions adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{config_is_valid, http_client, FailureCause, Provider, ProviderError};
use crate::config::{CloudKeyedConfig, ProviderConfig, ProviderKind};
use crate::context::PromptContext;
use crate::prompt::build_system_prompt;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Adapter for the OpenAI API (or any compatible endpoint via `base_url`).
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: CloudKeyedConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(config: CloudKeyedConfig) -> Result<Self, ProviderError> {
        let client = http_client(ProviderKind::OpenAi, config.timeout_secs)?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }

    fn error(cause: FailureCause, message: impl Into<String>) -> ProviderError {
        ProviderError::new(ProviderKind::OpenAi, cause, message)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn generate(
        &self,
        prompt: &str,
        context: &PromptContext,
    ) -> Result<String, ProviderError> {
        let api_key = self.config.api_key().ok_or_else(|| {
            Self::error(
                FailureCause::Authentication,
                "no API key (set OPENAI_API_KEY or providers.openai.api_key)",
            )
        })?;

        let system = build_system_prompt(context);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(model = %self.config.model, "sending OpenAI chat completion");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_http(ProviderKind::OpenAi, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(ProviderKind::OpenAi, status, &body));
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Self::error(FailureCause::MalformedResponse, e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| Self::error(FailureCause::MalformedResponse, "response contained no choices"))
    }

    fn validate_config(&self, config: &ProviderConfig) -> bool {
        config.kind() == ProviderKind::OpenAi && config_is_valid(config)
    }

    async fn is_available(&self) -> bool {
        self.config.api_key().is_some()
    }
}
