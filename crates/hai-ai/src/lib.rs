//! # hai AI layer
//!
//! Turns a natural-language request plus assembled context into a
//! structured, safety-annotated response.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Query +        │ --> │  Orchestrator   │ --> │  Structured     │
//! │  PromptContext  │     │  (retry/parse)  │     │  Response       │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!                               │
//!                      ┌────────┴────────┐
//!                      │ ProviderManager │
//!                      └────────┬────────┘
//!              OpenAI · Anthropic · Ollama · Local
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use hai_ai::{generate_with_retry, ProviderManager, ProviderSelection};
//!
//! let mut manager = ProviderManager::new(providers, &selection)?;
//! let provider = manager.resolve(&selection).await?;
//! let response = generate_with_retry(provider.as_ref(), "list files", &context, 3).await?;
//! ```

pub mod config;
pub mod context;
mod engine;
mod manager;
pub mod prompt;
pub mod provider;
mod response;
mod safety;

pub use config::{
    CloudKeyedConfig, ConfigurationError, LocalDaemonConfig, LocalFileConfig, ProviderConfig,
    ProviderKind, ProviderSelection, ProvidersConfig,
};
pub use context::{ContextSection, PromptContext, SectionKind};
pub use engine::{
    generate_with_policy, generate_with_retry, AttemptError, GenerateError, RetryPolicy,
    DEFAULT_MAX_RETRIES,
};
pub use manager::{CallbackId, ListenerResult, ProviderInfo, ProviderManager};
pub use provider::{create_provider, FailureCause, Provider, ProviderError};
pub use response::{
    extract_fallback_response, parse_response, ConfidenceLevel, ParseError, StructuredResponse,
    FALLBACK_CONFIDENCE,
};
pub use safety::{safety_warning, validate_command, UnsafeCommand};
