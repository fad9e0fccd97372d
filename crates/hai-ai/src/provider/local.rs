//! Local model file adapter backed by a managed llama-server.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use hai_local_ai::paths::expand_home;
use hai_local_ai::{CompletionOptions, LlamaCppServer, LocalAIError};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{config_is_valid, FailureCause, Provider, ProviderError};
use crate::config::{LocalFileConfig, ProviderConfig, ProviderKind};
use crate::context::PromptContext;
use crate::prompt::build_system_prompt;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Adapter that serves a GGUF model file through llama-server.
///
/// The server process is started on the first `generate` and stopped when
/// the provider is dropped.
pub struct LocalProvider {
    config: LocalFileConfig,
    model_path: PathBuf,
    server: Mutex<Option<LlamaCppServer>>,
}

impl LocalProvider {
    pub fn new(config: LocalFileConfig) -> Self {
        let model_path = expand_home(&config.model_path);
        Self {
            config,
            model_path,
            server: Mutex::new(None),
        }
    }
}

impl From<LocalAIError> for ProviderError {
    fn from(err: LocalAIError) -> Self {
        let cause = match &err {
            LocalAIError::Timeout | LocalAIError::ServerStartTimeout => FailureCause::Timeout,
            LocalAIError::ServerNotRunning(_) | LocalAIError::Http(_) => FailureCause::Connection,
            LocalAIError::ModelNotFound(_)
            | LocalAIError::ServerBinaryNotFound(_)
            | LocalAIError::ServerStartFailed(_)
            | LocalAIError::Io(_) => FailureCause::Unavailable,
            LocalAIError::Api(_) => FailureCause::Api,
        };
        ProviderError::new(ProviderKind::Local, cause, err.to_string())
    }
}

#[async_trait]
impl Provider for LocalProvider {
    async fn generate(
        &self,
        prompt: &str,
        context: &PromptContext,
    ) -> Result<String, ProviderError> {
        let mut guard = self.server.lock().await;

        let running = match guard.as_mut() {
            Some(server) => server.is_running(),
            None => false,
        };
        if !running {
            let mut server = LlamaCppServer::new(&self.model_path)
                .with_port(self.config.port)
                .with_context_size(self.config.context_size);
            info!("starting local model {}", self.model_path.display());
            server.start()?;
            server.wait_ready(STARTUP_TIMEOUT).await?;
            *guard = Some(server);
        }

        let client = match guard.as_ref() {
            Some(server) => server
                .client()
                .with_timeout(Duration::from_secs(self.config.timeout_secs)),
            None => {
                return Err(ProviderError::new(
                    ProviderKind::Local,
                    FailureCause::Unavailable,
                    "llama-server is not running",
                ))
            }
        };

        let system = build_system_prompt(context);
        debug!("sending local completion");
        let text = client
            .complete(&system, prompt, CompletionOptions::default())
            .await?;
        Ok(text.trim().to_string())
    }

    fn validate_config(&self, config: &ProviderConfig) -> bool {
        config.kind() == ProviderKind::Local && config_is_valid(config)
    }

    async fn is_available(&self) -> bool {
        let server = LlamaCppServer::new(&self.model_path);
        server.model_exists() && server.binary_exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_model_is_unavailable() {
        let provider = LocalProvider::new(LocalFileConfig::new("/nonexistent/model.gguf"));
        assert!(!provider.is_available().await);
    }

    #[tokio::test]
    async fn test_generate_without_model_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalProvider::new(LocalFileConfig::new(
            dir.path().join("missing.gguf").display().to_string(),
        ));
        let err = provider
            .generate("list files", &PromptContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.provider, ProviderKind::Local);
        assert_eq!(err.cause, FailureCause::Unavailable);
    }

    #[test]
    fn test_local_error_mapping() {
        let err: ProviderError = LocalAIError::Timeout.into();
        assert_eq!(err.cause, FailureCause::Timeout);
        let err: ProviderError = LocalAIError::Api("500: boom".to_string()).into();
        assert_eq!(err.cause, FailureCause::Api);
        assert!(err.message.contains("boom"));
    }

    #[test]
    fn test_validate_config_rejects_other_kinds() {
        let provider = LocalProvider::new(LocalFileConfig::new("/m.gguf"));
        assert!(provider.validate_config(&ProviderConfig::Local(LocalFileConfig::new("/m.gguf"))));
        assert!(!provider.validate_config(&ProviderConfig::Ollama(Default::default())));
    }
}
