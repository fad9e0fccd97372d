//! Ollama adapter for locally served models.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{config_is_valid, http_client, FailureCause, Provider, ProviderError};
use crate::config::{LocalDaemonConfig, ProviderConfig, ProviderKind};
use crate::context::PromptContext;
use crate::prompt::build_system_prompt;

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Adapter for an Ollama server.
pub struct OllamaProvider {
    client: reqwest::Client,
    config: LocalDaemonConfig,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// One `/api/generate` object; a whole reply or one streamed chunk.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// Joins newline-delimited JSON chunks into one reply.
///
/// Bytes may arrive split anywhere, including mid-line.
#[derive(Debug, Default)]
struct StreamAggregator {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl StreamAggregator {
    fn feed(&mut self, bytes: &[u8]) -> Result<(), String> {
        self.pending.extend_from_slice(bytes);
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.push_line(&String::from_utf8_lossy(&line))?;
        }
        Ok(())
    }

    fn push_line(&mut self, line: &str) -> Result<(), String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        let chunk: GenerateChunk = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!("skipping invalid stream line: {}", e);
                return Ok(());
            }
        };
        if let Some(error) = chunk.error {
            return Err(error);
        }
        self.text.push_str(&chunk.response);
        if chunk.done {
            self.done = true;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<String, String> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.push_line(&String::from_utf8_lossy(&rest))?;
        }
        if !self.done {
            warn!("Ollama stream ended without a done marker");
        }
        Ok(self.text)
    }
}

impl OllamaProvider {
    pub fn new(config: LocalDaemonConfig) -> Result<Self, ProviderError> {
        let client = http_client(ProviderKind::Ollama, config.timeout_secs)?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn error(cause: FailureCause, message: impl Into<String>) -> ProviderError {
        ProviderError::new(ProviderKind::Ollama, cause, message)
    }

    /// Whether `name` from `/api/tags` is the configured model.
    fn matches_model(&self, name: &str) -> bool {
        let model = self.config.model.as_str();
        let base = model.split(':').next().unwrap_or(model);
        name == model || (!model.contains(':') && name.starts_with(&format!("{}:", base)))
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn generate(
        &self,
        prompt: &str,
        context: &PromptContext,
    ) -> Result<String, ProviderError> {
        let system = build_system_prompt(context);
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            system: &system,
            stream: self.config.stream,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        debug!(model = %self.config.model, stream = self.config.stream, "sending Ollama generate");

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let mut err = ProviderError::from_http(ProviderKind::Ollama, e);
                if err.cause == FailureCause::Connection {
                    err.message = format!(
                        "Ollama server not running at {}. Start it with: ollama serve",
                        self.config.base_url
                    );
                }
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let mut err = ProviderError::from_status(ProviderKind::Ollama, status, &body);
            if status == reqwest::StatusCode::NOT_FOUND {
                err.message = format!(
                    "{} (pull it with: ollama pull {})",
                    err.message, self.config.model
                );
            }
            return Err(err);
        }

        let text = if self.config.stream {
            let mut aggregator = StreamAggregator::default();
            let mut stream = response.bytes_stream();
            while let Some(bytes) = stream.next().await {
                let bytes = bytes.map_err(|e| ProviderError::from_http(ProviderKind::Ollama, e))?;
                aggregator
                    .feed(&bytes)
                    .map_err(|e| Self::error(FailureCause::Api, e))?;
            }
            aggregator
                .finish()
                .map_err(|e| Self::error(FailureCause::Api, e))?
        } else {
            let chunk: GenerateChunk = response
                .json()
                .await
                .map_err(|e| Self::error(FailureCause::MalformedResponse, e.to_string()))?;
            if let Some(error) = chunk.error {
                return Err(Self::error(FailureCause::Api, error));
            }
            chunk.response
        };

        Ok(text.trim().to_string())
    }

    fn validate_config(&self, config: &ProviderConfig) -> bool {
        config.kind() == ProviderKind::Ollama && config_is_valid(config)
    }

    async fn is_available(&self) -> bool {
        let response = match self
            .client
            .get(self.url("/api/tags"))
            .timeout(AVAILABILITY_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!("Ollama tags returned {}", response.status());
                return false;
            }
            Err(e) => {
                debug!("Ollama not reachable: {}", e);
                return false;
            }
        };

        match response.json::<TagsResponse>().await {
            Ok(tags) => tags.models.iter().any(|m| self.matches_model(&m.name)),
            Err(e) => {
                debug!("unreadable Ollama tags response: {}", e);
                false
            }
        }
    }
}
