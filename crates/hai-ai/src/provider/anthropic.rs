//! Anthropic Messages API adapter.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{config_is_valid, http_client, FailureCause, Provider, ProviderError};
use crate::config::{CloudKeyedConfig, ProviderConfig, ProviderKind};
use crate::context::PromptContext;
use crate::prompt::build_system_prompt;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Adapter for Claude models.
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: CloudKeyedConfig,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

impl MessagesResponse {
    /// Concatenate every text block.
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

impl AnthropicProvider {
    pub fn new(config: CloudKeyedConfig) -> Result<Self, ProviderError> {
        let client = http_client(ProviderKind::Anthropic, config.timeout_secs)?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!("{}/v1/messages", base.trim_end_matches('/'))
    }

    fn error(cause: FailureCause, message: impl Into<String>) -> ProviderError {
        ProviderError::new(ProviderKind::Anthropic, cause, message)
    }

    fn headers(api_key: &str) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|_| {
                Self::error(
                    FailureCause::Authentication,
                    "API key contains invalid characters",
                )
            })?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        Ok(headers)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn generate(
        &self,
        prompt: &str,
        context: &PromptContext,
    ) -> Result<String, ProviderError> {
        let api_key = self.config.api_key().ok_or_else(|| {
            Self::error(
                FailureCause::Authentication,
                "no API key (set ANTHROPIC_API_KEY or providers.anthropic.api_key)",
            )
        })?;

        let system = build_system_prompt(context);
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: &system,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.config.model, "sending Anthropic messages request");

        let response = self
            .client
            .post(self.endpoint())
            .headers(Self::headers(api_key)?)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_http(ProviderKind::Anthropic, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                ProviderKind::Anthropic,
                status,
                &body,
            ));
        }

        let response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Self::error(FailureCause::MalformedResponse, e.to_string()))?;

        let text = response.text();
        if text.trim().is_empty() {
            return Err(Self::error(
                FailureCause::MalformedResponse,
                "response contained no text blocks",
            ));
        }
        Ok(text.trim().to_string())
    }

    fn validate_config(&self, config: &ProviderConfig) -> bool {
        config.kind() == ProviderKind::Anthropic && config_is_valid(config)
    }

    async fn is_available(&self) -> bool {
        self.config.api_key().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let provider = AnthropicProvider::new(CloudKeyedConfig::anthropic()).unwrap();
        assert_eq!(provider.endpoint(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_text_blocks_concatenated() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content": [
                {"type": "text", "text": "{\"explanation\": "},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "\"hi\"}"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(response.text(), r#"{"explanation": "hi"}"#);
    }

    #[test]
    fn test_headers() {
        let headers = AnthropicProvider::headers("sk-ant-test").unwrap();
        assert_eq!(headers["x-api-key"], "sk-ant-test");
        assert_eq!(headers["anthropic-version"], ANTHROPIC_VERSION);
        assert!(AnthropicProvider::headers("bad\nkey").is_err());
    }

    #[test]
    fn test_request_carries_system_prompt() {
        let request = MessagesRequest {
            model: "claude-sonnet-4-5",
            max_tokens: 1000,
            temperature: 0.7,
            system: "be terse",
            messages: vec![Message {
                role: "user",
                content: "list files",
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["system"], "be terse");
        assert_eq!(json["messages"][0]["content"], "list files");
    }

    #[tokio::test]
    async fn test_available_only_with_key() {
        let mut config = CloudKeyedConfig::anthropic();
        assert!(!AnthropicProvider::new(config.clone()).unwrap().is_available().await);
        config.api_key = Some("sk-ant-test".to_string());
        assert!(AnthropicProvider::new(config).unwrap().is_available().await);
    }
}
