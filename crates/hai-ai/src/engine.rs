//! Generation orchestrator: provider call, parse, retry, fallback, safety.

use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::context::PromptContext;
use crate::prompt::RETRY_INSTRUCTION;
use crate::provider::{Provider, ProviderError};
use crate::response::{extract_fallback_response, parse_response, ParseError, StructuredResponse};
use crate::safety::safety_warning;

/// Default number of attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the second attempt; doubles for each one after.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// `max_retries` attempts with no delay between them.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::ZERO,
        }
    }

    pub fn with_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Delay before `attempt` (1-based). The first attempt never waits.
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt - 2))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

/// The failure of a single attempt.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Generation failed for good.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerateError {
    #[error("failed to get a valid response after {attempts} attempt(s): {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: AttemptError,
    },
    #[error("max_retries must be at least 1")]
    NoAttempts,
}

/// Generate a response with `max_retries` attempts and no backoff.
pub async fn generate_with_retry(
    provider: &dyn Provider,
    prompt: &str,
    context: &PromptContext,
    max_retries: u32,
) -> Result<StructuredResponse, GenerateError> {
    generate_with_policy(provider, prompt, context, RetryPolicy::new(max_retries)).await
}

/// Generate a structured, safety-annotated response.
///
/// Each attempt calls the provider and parses its reply. After an
/// unparseable reply the prompt gains a "JSON only" instruction. When every
/// attempt fails and the final one produced text, that text is handed to
/// the fallback extractor once before giving up.
pub async fn generate_with_policy(
    provider: &dyn Provider,
    prompt: &str,
    context: &PromptContext,
    policy: RetryPolicy,
) -> Result<StructuredResponse, GenerateError> {
    if policy.max_retries == 0 {
        return Err(GenerateError::NoAttempts);
    }

    let mut current_prompt = prompt.to_string();
    let mut last_error: Option<AttemptError> = None;
    let mut last_raw: Option<String> = None;

    for attempt in 1..=policy.max_retries {
        let delay = policy.backoff_before(attempt);
        if !delay.is_zero() {
            debug!("waiting {:?} before attempt {}", delay, attempt);
            sleep(delay).await;
        }

        match provider.generate(&current_prompt, context).await {
            Ok(raw) => match parse_response(&raw) {
                Ok(response) => {
                    info!(
                        "parsed response on attempt {} (confidence {})",
                        attempt, response.confidence
                    );
                    return Ok(annotate(response));
                }
                Err(e) => {
                    warn!(
                        "attempt {}/{}: unparseable response: {}",
                        attempt, policy.max_retries, e
                    );
                    if !current_prompt.ends_with(RETRY_INSTRUCTION) {
                        current_prompt.push_str(RETRY_INSTRUCTION);
                    }
                    last_raw = Some(raw);
                    last_error = Some(e.into());
                }
            },
            Err(e) => {
                warn!(
                    "attempt {}/{}: provider error: {}",
                    attempt, policy.max_retries, e
                );
                last_raw = None;
                last_error = Some(e.into());
            }
        }
    }

    if let Some(raw) = last_raw {
        if let Some(fallback) = extract_fallback_response(&raw) {
            info!("recovered command via fallback extraction");
            return Ok(annotate(fallback));
        }
    }

    match last_error {
        Some(last_error) => Err(GenerateError::Exhausted {
            attempts: policy.max_retries,
            last_error,
        }),
        None => Err(GenerateError::NoAttempts),
    }
}

fn annotate(mut response: StructuredResponse) -> StructuredResponse {
    if let Some(command) = &response.command {
        response.safety_warning = safety_warning(command);
        if let Some(warning) = &response.safety_warning {
            warn!("safety warning for '{}': {}", command, warning);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderConfig, ProviderKind};
    use crate::provider::FailureCause;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted replies and records every prompt it receives.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn repeat(reply: &str, times: usize) -> Self {
            Self::new(vec![Ok(reply.to_string()); times])
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Provider for Scripted {
        async fn generate(
            &self,
            prompt: &str,
            _context: &PromptContext,
        ) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(timeout()))
        }

        fn validate_config(&self, _config: &ProviderConfig) -> bool {
            true
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    fn timeout() -> ProviderError {
        ProviderError::new(ProviderKind::Ollama, FailureCause::Timeout, "no reply")
    }

    #[tokio::test]
    async fn test_show_current_directory() {
        let provider =
            Scripted::repeat(r#"{"explanation":"Shows cwd","command":"pwd","confidence":95}"#, 1);
        let response =
            generate_with_retry(&provider, "show current directory", &PromptContext::new(), 3)
                .await
                .unwrap();
        assert_eq!(response.explanation, "Shows cwd");
        assert_eq!(response.command.as_deref(), Some("pwd"));
        assert_eq!(response.confidence, 95);
        assert_eq!(response.safety_warning, None);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_dangerous_command_is_annotated_not_rejected() {
        let provider = Scripted::repeat(
            r#"{"explanation":"Removes all files","command":"rm -rf /","confidence":80}"#,
            1,
        );
        let response = generate_with_retry(&provider, "delete everything", &PromptContext::new(), 3)
            .await
            .unwrap();
        assert_eq!(response.command.as_deref(), Some("rm -rf /"));
        assert!(response.safety_warning.unwrap().contains("rm"));
    }

    #[tokio::test]
    async fn test_retry_appends_json_instruction() {
        let provider = Scripted::new(vec![
            Ok("Sure! Let me think about that.".to_string()),
            Ok(r#"{"explanation":"List","command":"ls","confidence":70}"#.to_string()),
        ]);
        let response = generate_with_retry(&provider, "list files", &PromptContext::new(), 3)
            .await
            .unwrap();
        assert_eq!(response.command.as_deref(), Some("ls"));

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts[0], "list files");
        assert_eq!(prompts[1], format!("list files{}", RETRY_INSTRUCTION));
    }

    #[tokio::test]
    async fn test_instruction_appended_once() {
        let provider = Scripted::repeat("nope", 3);
        let _ = generate_with_retry(&provider, "q", &PromptContext::new(), 3).await;
        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts[2], format!("q{}", RETRY_INSTRUCTION));
    }

    #[tokio::test]
    async fn test_fallback_after_exhaustion() {
        let provider = Scripted::repeat("I'll list files: `ls -la`", 3);
        let response = generate_with_retry(&provider, "list files", &PromptContext::new(), 3)
            .await
            .unwrap();
        assert_eq!(response.command.as_deref(), Some("ls -la"));
        assert_eq!(response.confidence, 50);
        assert!(response.fallback);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_unrecoverable_prose_is_error() {
        let provider = Scripted::repeat("I cannot help with that request.", 3);
        let err = generate_with_retry(&provider, "x", &PromptContext::new(), 3)
            .await
            .unwrap_err();
        match err {
            GenerateError::Exhausted {
                attempts,
                last_error: AttemptError::Parse(ParseError::InvalidJson(_)),
            } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_provider_errors_consume_attempts() {
        let provider = Scripted::new(vec![
            Err(timeout()),
            Ok(r#"{"explanation":"Date","command":"date","confidence":90}"#.to_string()),
        ]);
        let response = generate_with_retry(&provider, "what day", &PromptContext::new(), 2)
            .await
            .unwrap();
        assert_eq!(response.command.as_deref(), Some("date"));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_all_provider_errors() {
        let provider = Scripted::new(vec![]);
        let err = generate_with_retry(&provider, "x", &PromptContext::new(), 2)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GenerateError::Exhausted {
                attempts: 2,
                last_error: AttemptError::Provider(timeout()),
            }
        );
    }

    #[tokio::test]
    async fn test_fallback_only_uses_final_attempt() {
        let provider = Scripted::new(vec![Ok("try `ls`".to_string()), Err(timeout())]);
        let err = generate_with_retry(&provider, "x", &PromptContext::new(), 2)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerateError::Exhausted {
                last_error: AttemptError::Provider(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_zero_retries_rejected() {
        let provider = Scripted::new(vec![]);
        assert_eq!(
            generate_with_retry(&provider, "x", &PromptContext::new(), 0).await,
            Err(GenerateError::NoAttempts)
        );
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_question_answer_has_no_warning() {
        let provider = Scripted::repeat(
            r#"{"explanation":"-h prints sizes in human units","confidence":92}"#,
            1,
        );
        let response = generate_with_retry(&provider, "what does -h do", &PromptContext::new(), 3)
            .await
            .unwrap();
        assert!(response.is_question());
        assert_eq!(response.safety_warning, None);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(4).with_backoff(Duration::from_millis(500));
        assert_eq!(policy.backoff_before(1), Duration::ZERO);
        assert_eq!(policy.backoff_before(2), Duration::from_millis(500));
        assert_eq!(policy.backoff_before(3), Duration::from_millis(1000));
        assert_eq!(policy.backoff_before(4), Duration::from_millis(2000));
        assert_eq!(RetryPolicy::default().backoff_before(3), Duration::ZERO);
    }
}
