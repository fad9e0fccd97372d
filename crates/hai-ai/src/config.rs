//! Provider configuration.
//!
//! One configuration block per backend kind, plus the selection (single
//! provider or ordered priority list) that decides which blocks must exist.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default OpenAI model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Default Anthropic model.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";

/// Default Ollama server URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default Ollama model.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// Allowed context window range for local model files.
pub const CONTEXT_SIZE_RANGE: (u32, u32) = (512, 128_000);

/// The backend kinds hai knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Ollama,
    Local,
}

impl ProviderKind {
    /// Every recognized provider, in display order.
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Ollama,
        ProviderKind::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Local => "local",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownProvider(s.to_string()))
    }
}

/// Configuration errors. Always fatal, surfaced before any model call.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown provider '{0}' (expected one of: openai, anthropic, ollama, local)")]
    UnknownProvider(String),
    #[error("provider '{0}' is selected but has no configuration")]
    MissingProviderConfig(ProviderKind),
    #[error("provider_priority list cannot be empty")]
    EmptyPriority,
    #[error("provider_priority list cannot contain duplicates ('{0}' appears twice)")]
    DuplicateProvider(ProviderKind),
    #[error("{provider}: base_url must start with http:// or https:// (got '{url}')")]
    InvalidBaseUrl { provider: ProviderKind, url: String },
    #[error("local: context_size must be between 512 and 128000 (got {0})")]
    ContextSizeOutOfRange(u32),
    #[error("local: model_path is required")]
    EmptyModelPath,
    #[error("{0}: model must not be empty")]
    EmptyModel(ProviderKind),
}

/// Authenticated cloud API configuration (OpenAI, Anthropic).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloudKeyedConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CloudKeyedConfig {
    fn with_model(model: &str) -> Self {
        Self {
            api_key: None,
            model: model.to_string(),
            base_url: None,
            timeout_secs: 60,
            max_tokens: 1000,
            temperature: 0.7,
        }
    }

    pub fn openai() -> Self {
        Self::with_model(DEFAULT_OPENAI_MODEL)
    }

    pub fn anthropic() -> Self {
        Self::with_model(DEFAULT_ANTHROPIC_MODEL)
    }

    /// API key, if present and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Unauthenticated local HTTP daemon configuration (Ollama).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalDaemonConfig {
    pub base_url: String,
    pub model: String,
    pub stream: bool,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for LocalDaemonConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            stream: true,
            timeout_secs: 60,
            temperature: 0.7,
        }
    }
}

/// In-process (llama.cpp) model file configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalFileConfig {
    pub model_path: String,
    #[serde(default = "default_context_size")]
    pub context_size: u32,
    #[serde(default = "default_local_port")]
    pub port: u16,
    #[serde(default = "default_local_timeout")]
    pub timeout_secs: u64,
}

fn default_context_size() -> u32 {
    hai_local_ai::DEFAULT_CONTEXT_SIZE
}

fn default_local_port() -> u16 {
    hai_local_ai::DEFAULT_PORT
}

fn default_local_timeout() -> u64 {
    120
}

impl LocalFileConfig {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            context_size: default_context_size(),
            port: default_local_port(),
            timeout_secs: default_local_timeout(),
        }
    }
}

/// Configuration for one provider, tagged by backend kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    OpenAi(CloudKeyedConfig),
    Anthropic(CloudKeyedConfig),
    Ollama(LocalDaemonConfig),
    Local(LocalFileConfig),
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::OpenAi(_) => ProviderKind::OpenAi,
            ProviderConfig::Anthropic(_) => ProviderKind::Anthropic,
            ProviderConfig::Ollama(_) => ProviderKind::Ollama,
            ProviderConfig::Local(_) => ProviderKind::Local,
        }
    }

    /// The model identifier (a file path for local models).
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAi(c) | ProviderConfig::Anthropic(c) => &c.model,
            ProviderConfig::Ollama(c) => &c.model,
            ProviderConfig::Local(c) => &c.model_path,
        }
    }
}

/// Configuration for all providers. A `None` block means "not configured".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawProvidersConfig")]
pub struct ProvidersConfig {
    pub openai: Option<CloudKeyedConfig>,
    pub anthropic: Option<CloudKeyedConfig>,
    pub ollama: Option<LocalDaemonConfig>,
    pub local: Option<LocalFileConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: Some(CloudKeyedConfig::openai()),
            anthropic: Some(CloudKeyedConfig::anthropic()),
            ollama: Some(LocalDaemonConfig::default()),
            local: None,
        }
    }
}

impl ProvidersConfig {
    /// Configuration block for `kind`, if configured.
    pub fn get(&self, kind: ProviderKind) -> Option<ProviderConfig> {
        match kind {
            ProviderKind::OpenAi => self.openai.clone().map(ProviderConfig::OpenAi),
            ProviderKind::Anthropic => self.anthropic.clone().map(ProviderConfig::Anthropic),
            ProviderKind::Ollama => self.ollama.clone().map(ProviderConfig::Ollama),
            ProviderKind::Local => self.local.clone().map(ProviderConfig::Local),
        }
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::OpenAi => self.openai.is_some(),
            ProviderKind::Anthropic => self.anthropic.is_some(),
            ProviderKind::Ollama => self.ollama.is_some(),
            ProviderKind::Local => self.local.is_some(),
        }
    }

    /// Fill missing API keys from `OPENAI_API_KEY` / `ANTHROPIC_API_KEY`.
    pub fn apply_env_keys(&mut self) {
        self.apply_keys_from(|name| std::env::var(name).ok());
    }

    /// Fill missing API keys using `lookup` for the environment.
    pub fn apply_keys_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let targets = [
            (self.openai.as_mut(), "OPENAI_API_KEY"),
            (self.anthropic.as_mut(), "ANTHROPIC_API_KEY"),
        ];
        for (config, var) in targets {
            if let Some(config) = config {
                if config.api_key().is_none() {
                    if let Some(key) = lookup(var).filter(|k| !k.trim().is_empty()) {
                        config.api_key = Some(key);
                    }
                }
            }
        }
    }

    /// Check field-level constraints of every configured block.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (kind, cloud) in [
            (ProviderKind::OpenAi, &self.openai),
            (ProviderKind::Anthropic, &self.anthropic),
        ] {
            if let Some(cloud) = cloud {
                if cloud.model.trim().is_empty() {
                    return Err(ConfigurationError::EmptyModel(kind));
                }
                if let Some(url) = &cloud.base_url {
                    if !is_http_url(url) {
                        return Err(ConfigurationError::InvalidBaseUrl {
                            provider: kind,
                            url: url.clone(),
                        });
                    }
                }
            }
        }

        if let Some(ollama) = &self.ollama {
            if !is_http_url(&ollama.base_url) {
                return Err(ConfigurationError::InvalidBaseUrl {
                    provider: ProviderKind::Ollama,
                    url: ollama.base_url.clone(),
                });
            }
            if ollama.model.trim().is_empty() {
                return Err(ConfigurationError::EmptyModel(ProviderKind::Ollama));
            }
        }

        if let Some(local) = &self.local {
            if local.model_path.trim().is_empty() {
                return Err(ConfigurationError::EmptyModelPath);
            }
            let (min, max) = CONTEXT_SIZE_RANGE;
            if !(min..=max).contains(&local.context_size) {
                return Err(ConfigurationError::ContextSizeOutOfRange(local.context_size));
            }
        }

        Ok(())
    }
}

pub(crate) fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Which provider(s) to use: one name, or an ordered fallback list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSelection {
    Single(ProviderKind),
    Priority(Vec<ProviderKind>),
}

impl ProviderSelection {
    /// Build a selection. A priority list, when given, overrides `provider`.
    pub fn new(
        provider: ProviderKind,
        priority: Option<Vec<ProviderKind>>,
    ) -> Result<Self, ConfigurationError> {
        let Some(priority) = priority else {
            return Ok(ProviderSelection::Single(provider));
        };

        if priority.is_empty() {
            return Err(ConfigurationError::EmptyPriority);
        }
        for (i, kind) in priority.iter().enumerate() {
            if priority[..i].contains(kind) {
                return Err(ConfigurationError::DuplicateProvider(*kind));
            }
        }
        Ok(ProviderSelection::Priority(priority))
    }

    /// Ordered candidate sequence (a singleton in the simple case).
    pub fn candidates(&self) -> Vec<ProviderKind> {
        match self {
            ProviderSelection::Single(kind) => vec![*kind],
            ProviderSelection::Priority(list) => list.clone(),
        }
    }

    /// The first candidate.
    pub fn primary(&self) -> ProviderKind {
        match self {
            ProviderSelection::Single(kind) => *kind,
            ProviderSelection::Priority(list) => {
                list.first().copied().unwrap_or(ProviderKind::Ollama)
            }
        }
    }

    /// Fail fast if any candidate lacks a configuration block.
    pub fn validate(&self, providers: &ProvidersConfig) -> Result<(), ConfigurationError> {
        if matches!(self, ProviderSelection::Priority(list) if list.is_empty()) {
            return Err(ConfigurationError::EmptyPriority);
        }
        for kind in self.candidates() {
            if !providers.is_configured(kind) {
                return Err(ConfigurationError::MissingProviderConfig(kind));
            }
        }
        Ok(())
    }

    /// Non-fatal problems worth telling the user about.
    pub fn warnings(&self, providers: &ProvidersConfig) -> Vec<String> {
        let mut warnings = Vec::new();
        for kind in self.candidates() {
            let missing_key = match kind {
                ProviderKind::OpenAi => providers
                    .openai
                    .as_ref()
                    .is_some_and(|c| c.api_key().is_none()),
                ProviderKind::Anthropic => providers
                    .anthropic
                    .as_ref()
                    .is_some_and(|c| c.api_key().is_none()),
                _ => false,
            };
            if missing_key {
                warnings.push(format!(
                    "{} provider in chain but 'api_key' not set. Set {}_API_KEY or add it to the config.",
                    kind,
                    kind.as_str().to_uppercase()
                ));
            }
        }
        warnings
    }
}

// Serde plumbing: cloud blocks get per-kind model defaults.

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCloudConfig {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl RawCloudConfig {
    fn into_config(self, defaults: CloudKeyedConfig) -> CloudKeyedConfig {
        CloudKeyedConfig {
            api_key: self.api_key,
            model: self.model.unwrap_or(defaults.model),
            base_url: self.base_url,
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
        }
    }
}

fn default_raw_cloud() -> Option<RawCloudConfig> {
    Some(RawCloudConfig::default())
}

fn default_raw_ollama() -> Option<LocalDaemonConfig> {
    Some(LocalDaemonConfig::default())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProvidersConfig {
    #[serde(default = "default_raw_cloud")]
    openai: Option<RawCloudConfig>,
    #[serde(default = "default_raw_cloud")]
    anthropic: Option<RawCloudConfig>,
    #[serde(default = "default_raw_ollama")]
    ollama: Option<LocalDaemonConfig>,
    #[serde(default)]
    local: Option<LocalFileConfig>,
}

impl From<RawProvidersConfig> for ProvidersConfig {
    fn from(raw: RawProvidersConfig) -> Self {
        Self {
            openai: raw.openai.map(|c| c.into_config(CloudKeyedConfig::openai())),
            anthropic: raw
                .anthropic
                .map(|c| c.into_config(CloudKeyedConfig::anthropic())),
            ollama: raw.ollama,
            local: raw.local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_round_trip_names() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
        assert_eq!(
            "gemini".parse::<ProviderKind>(),
            Err(ConfigurationError::UnknownProvider("gemini".to_string()))
        );
    }

    #[test]
    fn test_default_providers() {
        let providers = ProvidersConfig::default();
        assert!(providers.is_configured(ProviderKind::OpenAi));
        assert!(providers.is_configured(ProviderKind::Anthropic));
        assert!(providers.is_configured(ProviderKind::Ollama));
        assert!(!providers.is_configured(ProviderKind::Local));
    }

    #[test]
    fn test_deserialize_applies_per_kind_defaults() {
        let providers: ProvidersConfig =
            serde_json::from_str(r#"{"openai": {"api_key": "sk-test"}, "anthropic": {}}"#).unwrap();
        let openai = providers.openai.unwrap();
        assert_eq!(openai.model, DEFAULT_OPENAI_MODEL);
        assert_eq!(openai.api_key(), Some("sk-test"));
        assert_eq!(providers.anthropic.unwrap().model, DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(providers.ollama.unwrap().base_url, DEFAULT_OLLAMA_URL);
        assert!(providers.local.is_none());
    }

    #[test]
    fn test_deserialize_explicit_null_disables() {
        let providers: ProvidersConfig = serde_json::from_str(r#"{"openai": null}"#).unwrap();
        assert!(providers.openai.is_none());
        assert!(providers.anthropic.is_some());
    }

    #[test]
    fn test_local_defaults() {
        let providers: ProvidersConfig =
            serde_json::from_str(r#"{"local": {"model_path": "/m/llama.gguf"}}"#).unwrap();
        let local = providers.local.unwrap();
        assert_eq!(local.context_size, 4096);
        assert_eq!(local.port, hai_local_ai::DEFAULT_PORT);
    }

    #[test]
    fn test_validate_base_url_scheme() {
        let mut providers = ProvidersConfig::default();
        providers.ollama.as_mut().unwrap().base_url = "localhost:11434".to_string();
        assert!(matches!(
            providers.validate(),
            Err(ConfigurationError::InvalidBaseUrl {
                provider: ProviderKind::Ollama,
                ..
            })
        ));
    }

    #[test]
    fn test_validate_context_size_bounds() {
        let mut providers = ProvidersConfig::default();
        providers.local = Some(LocalFileConfig {
            context_size: 256,
            ..LocalFileConfig::new("/m.gguf")
        });
        assert_eq!(
            providers.validate(),
            Err(ConfigurationError::ContextSizeOutOfRange(256))
        );

        providers.local.as_mut().unwrap().context_size = 128_000;
        assert!(providers.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_model_path() {
        let providers = ProvidersConfig {
            local: Some(LocalFileConfig::new("  ")),
            ..ProvidersConfig::default()
        };
        assert_eq!(providers.validate(), Err(ConfigurationError::EmptyModelPath));
    }

    #[test]
    fn test_selection_single() {
        let selection = ProviderSelection::new(ProviderKind::Ollama, None).unwrap();
        assert_eq!(selection.candidates(), vec![ProviderKind::Ollama]);
        assert_eq!(selection.primary(), ProviderKind::Ollama);
    }

    #[test]
    fn test_selection_priority_overrides_provider() {
        let selection = ProviderSelection::new(
            ProviderKind::Ollama,
            Some(vec![ProviderKind::Anthropic, ProviderKind::Ollama]),
        )
        .unwrap();
        assert_eq!(
            selection.candidates(),
            vec![ProviderKind::Anthropic, ProviderKind::Ollama]
        );
        assert_eq!(selection.primary(), ProviderKind::Anthropic);
    }

    #[test]
    fn test_selection_rejects_empty_and_duplicates() {
        assert_eq!(
            ProviderSelection::new(ProviderKind::Ollama, Some(vec![])),
            Err(ConfigurationError::EmptyPriority)
        );
        assert_eq!(
            ProviderSelection::new(
                ProviderKind::Ollama,
                Some(vec![ProviderKind::OpenAi, ProviderKind::OpenAi])
            ),
            Err(ConfigurationError::DuplicateProvider(ProviderKind::OpenAi))
        );
    }

    #[test]
    fn test_empty_priority_chain_built_directly() {
        let selection = ProviderSelection::Priority(Vec::new());
        assert_eq!(
            selection.validate(&ProvidersConfig::default()),
            Err(ConfigurationError::EmptyPriority)
        );
        assert_eq!(selection.primary(), ProviderKind::Ollama);
    }

    #[test]
    fn test_selection_requires_configuration() {
        let selection = ProviderSelection::new(ProviderKind::Local, None).unwrap();
        assert_eq!(
            selection.validate(&ProvidersConfig::default()),
            Err(ConfigurationError::MissingProviderConfig(ProviderKind::Local))
        );
    }

    #[test]
    fn test_apply_keys_from_lookup() {
        let mut providers = ProvidersConfig::default();
        providers.anthropic.as_mut().unwrap().api_key = Some("sk-ant-explicit".to_string());
        providers.apply_keys_from(|name| match name {
            "OPENAI_API_KEY" => Some("sk-from-env".to_string()),
            "ANTHROPIC_API_KEY" => Some("sk-ant-env".to_string()),
            _ => None,
        });
        assert_eq!(providers.openai.unwrap().api_key(), Some("sk-from-env"));
        assert_eq!(
            providers.anthropic.unwrap().api_key(),
            Some("sk-ant-explicit")
        );
    }

    #[test]
    fn test_warnings_for_missing_keys() {
        let selection = ProviderSelection::new(
            ProviderKind::Ollama,
            Some(vec![ProviderKind::OpenAi, ProviderKind::Ollama]),
        )
        .unwrap();
        let warnings = selection.warnings(&ProvidersConfig::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("OPENAI_API_KEY"));
    }
}
