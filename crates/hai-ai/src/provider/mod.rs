//! The provider abstraction and its four adapters.
//!
//! Every backend, whether a cloud API, a local daemon or a model file, is
//! driven through [`Provider`]. Backend failures are normalized into a
//! single [`ProviderError`] so the orchestrator never sees transport types.

mod anthropic;
mod local;
mod ollama;
mod openai;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{is_http_url, ProviderConfig, ProviderKind, CONTEXT_SIZE_RANGE};
use crate::context::PromptContext;

pub use anthropic::AnthropicProvider;
pub use local::LocalProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Capability set shared by every backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Produce the model's complete raw text for `prompt`.
    ///
    /// Streaming backends aggregate every chunk before returning.
    async fn generate(&self, prompt: &str, context: &PromptContext)
        -> Result<String, ProviderError>;

    /// Whether `config` is a usable configuration for this backend.
    fn validate_config(&self, config: &ProviderConfig) -> bool;

    /// Cheap readiness probe. Never fails, only answers.
    async fn is_available(&self) -> bool;
}

/// What went wrong talking to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    Connection,
    Authentication,
    Timeout,
    /// The backend answered with an error.
    Api,
    /// The backend answered with something we could not read.
    MalformedResponse,
    /// The backend cannot run here (missing model file, missing binary).
    Unavailable,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureCause::Connection => "connection failed",
            FailureCause::Authentication => "authentication failed",
            FailureCause::Timeout => "timed out",
            FailureCause::Api => "api error",
            FailureCause::MalformedResponse => "malformed response",
            FailureCause::Unavailable => "unavailable",
        })
    }
}

/// A backend failure, normalized across providers.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{provider}: {cause}: {message}")]
pub struct ProviderError {
    pub provider: ProviderKind,
    pub cause: FailureCause,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: ProviderKind, cause: FailureCause, message: impl Into<String>) -> Self {
        Self {
            provider,
            cause,
            message: message.into(),
        }
    }

    /// Classify a transport error.
    pub fn from_http(provider: ProviderKind, err: reqwest::Error) -> Self {
        let cause = if err.is_timeout() {
            FailureCause::Timeout
        } else if err.is_connect() {
            FailureCause::Connection
        } else if err.is_decode() {
            FailureCause::MalformedResponse
        } else {
            FailureCause::Api
        };
        Self::new(provider, cause, err.to_string())
    }

    /// Classify a non-success HTTP status. `body` is the raw response text.
    pub(crate) fn from_status(provider: ProviderKind, status: reqwest::StatusCode, body: &str) -> Self {
        let cause = match status.as_u16() {
            401 | 403 => FailureCause::Authentication,
            408 | 504 => FailureCause::Timeout,
            _ => FailureCause::Api,
        };
        let detail = api_error_message(body).unwrap_or_else(|| body.trim().to_string());
        Self::new(provider, cause, format!("HTTP {}: {}", status.as_u16(), detail))
    }
}

/// Pull `error.message` (or a string `error`) out of a JSON error body.
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(str::to_string)
}

/// Field-level validity of a provider configuration.
pub fn config_is_valid(config: &ProviderConfig) -> bool {
    match config {
        ProviderConfig::OpenAi(c) | ProviderConfig::Anthropic(c) => {
            !c.model.trim().is_empty()
                && c.api_key().is_some()
                && c.base_url.as_deref().map_or(true, is_http_url)
        }
        ProviderConfig::Ollama(c) => !c.model.trim().is_empty() && is_http_url(&c.base_url),
        ProviderConfig::Local(c) => {
            let (min, max) = CONTEXT_SIZE_RANGE;
            !c.model_path.trim().is_empty() && (min..=max).contains(&c.context_size)
        }
    }
}

/// Build the adapter for `config`.
pub fn create_provider(config: ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    Ok(match config {
        ProviderConfig::OpenAi(c) => Arc::new(OpenAiProvider::new(c)?),
        ProviderConfig::Anthropic(c) => Arc::new(AnthropicProvider::new(c)?),
        ProviderConfig::Ollama(c) => Arc::new(OllamaProvider::new(c)?),
        ProviderConfig::Local(c) => Arc::new(LocalProvider::new(c)),
    })
}

/// An HTTP client with the adapter's request timeout applied.
pub(crate) fn http_client(
    provider: ProviderKind,
    timeout_secs: u64,
) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::from_http(provider, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CloudKeyedConfig, LocalDaemonConfig, LocalFileConfig};

    #[test]
    fn test_from_status_classifies_auth() {
        let err = ProviderError::from_status(
            ProviderKind::OpenAi,
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"error": {"message": "Incorrect API key provided"}}"#,
        );
        assert_eq!(err.cause, FailureCause::Authentication);
        assert_eq!(err.message, "HTTP 401: Incorrect API key provided");
    }

    #[test]
    fn test_from_status_plain_body() {
        let err = ProviderError::from_status(
            ProviderKind::Ollama,
            reqwest::StatusCode::NOT_FOUND,
            "model 'x' not found\n",
        );
        assert_eq!(err.cause, FailureCause::Api);
        assert_eq!(err.message, "HTTP 404: model 'x' not found");
    }

    #[test]
    fn test_from_status_string_error_field() {
        let err = ProviderError::from_status(
            ProviderKind::Ollama,
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": "out of memory"}"#,
        );
        assert_eq!(err.message, "HTTP 500: out of memory");
    }

    #[test]
    fn test_display_includes_provider_and_cause() {
        let err = ProviderError::new(ProviderKind::Anthropic, FailureCause::Timeout, "after 60s");
        assert_eq!(err.to_string(), "anthropic: timed out: after 60s");
    }

    #[test]
    fn test_config_is_valid() {
        let mut openai = CloudKeyedConfig::openai();
        assert!(!config_is_valid(&ProviderConfig::OpenAi(openai.clone())));
        openai.api_key = Some("sk-test".to_string());
        assert!(config_is_valid(&ProviderConfig::OpenAi(openai.clone())));
        openai.base_url = Some("ftp://example.com".to_string());
        assert!(!config_is_valid(&ProviderConfig::OpenAi(openai)));

        assert!(config_is_valid(&ProviderConfig::Ollama(
            LocalDaemonConfig::default()
        )));
        assert!(config_is_valid(&ProviderConfig::Local(LocalFileConfig::new(
            "/m.gguf"
        ))));
        assert!(!config_is_valid(&ProviderConfig::Local(LocalFileConfig::new(
            ""
        ))));
    }

    #[tokio::test]
    async fn test_create_provider_for_each_kind() {
        let mut openai = CloudKeyedConfig::openai();
        openai.api_key = Some("sk-test".to_string());
        let configs = [
            ProviderConfig::OpenAi(openai),
            ProviderConfig::Anthropic(CloudKeyedConfig::anthropic()),
            ProviderConfig::Ollama(LocalDaemonConfig::default()),
            ProviderConfig::Local(LocalFileConfig::new("/nonexistent/model.gguf")),
        ];
        for config in configs {
            let provider = create_provider(config.clone()).unwrap();
            assert_eq!(provider.validate_config(&config), config_is_valid(&config));
        }
    }
}
