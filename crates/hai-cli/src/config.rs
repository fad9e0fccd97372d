//! `~/.hai/config.yaml` loading and validation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hai_ai::{ConfigurationError, ProviderKind, ProviderSelection, ProvidersConfig};
use hai_context::ContextSettings;
use hai_memory::MemorySettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Provider(#[from] ConfigurationError),
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
}

/// Settings under `execution:`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionSettings {
    pub auto_execute: bool,
    /// Minimum confidence for running without a prompt.
    pub auto_execute_threshold: u8,
    pub require_confirmation: bool,
    pub timeout_secs: u64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            auto_execute: false,
            auto_execute_threshold: 85,
            require_confirmation: true,
            timeout_secs: 30,
        }
    }
}

/// Settings under `output:`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    pub show_explanation: bool,
    pub show_internal_dialogue: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            show_explanation: true,
            show_internal_dialogue: false,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HaiConfig {
    /// Defaults to `ollama`.
    pub provider: Option<String>,
    pub provider_priority: Option<Vec<String>>,
    pub providers: ProvidersConfig,
    pub context: ContextSettings,
    pub memory: MemorySettings,
    pub execution: ExecutionSettings,
    pub output: OutputSettings,
}

impl HaiConfig {
    /// Load `path`, or `~/.hai/config.yaml` when `None`.
    ///
    /// A missing file means defaults. API keys missing from the file are
    /// taken from the environment, then everything is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => hai_local_ai::paths::config_path(),
        };

        let mut config = match path {
            Some(path) if path.exists() => Self::read(&path)?,
            Some(path) => {
                debug!("no config at {}; using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.providers.apply_env_keys();
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse YAML text. Blank text means defaults.
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }

    /// The provider selection described by `provider` and `provider_priority`.
    pub fn selection(&self) -> Result<ProviderSelection, ConfigurationError> {
        let provider = match &self.provider {
            Some(name) => name.parse()?,
            None => ProviderKind::Ollama,
        };
        let priority = self
            .provider_priority
            .as_ref()
            .map(|names| {
                names
                    .iter()
                    .map(|name| name.parse::<ProviderKind>())
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;
        ProviderSelection::new(provider, priority)
    }

    /// Check every constraint. Warnings are logged, errors returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let selection = self.selection()?;
        self.providers.validate()?;
        selection.validate(&self.providers)?;

        if self.provider_priority.is_some() && self.provider.is_some() {
            warn!(
                "both 'provider' and 'provider_priority' are set; provider_priority takes precedence"
            );
        }
        for warning in selection.warnings(&self.providers) {
            warn!("{}", warning);
        }

        let context = &self.context;
        check_range("context.history_length", context.history_length as f64, 0.0, 100.0)?;
        check_range(
            "context.file_listing_max_files",
            context.file_listing_max_files as f64,
            0.0,
            1000.0,
        )?;
        check_range(
            "context.file_listing_max_depth",
            context.file_listing_max_depth as f64,
            0.0,
            10.0,
        )?;
        check_range(
            "context.max_context_tokens",
            context.max_context_tokens as f64,
            500.0,
            16000.0,
        )?;
        check_range(
            "context.context_relevance_threshold",
            context.context_relevance_threshold,
            0.0,
            1.0,
        )?;

        let memory = &self.memory;
        check_range(
            "memory.session_max_interactions",
            memory.session_max_interactions as f64,
            1.0,
            100.0,
        )?;
        check_range(
            "memory.directory_max_patterns",
            memory.directory_max_patterns as f64,
            10.0,
            500.0,
        )?;
        check_range(
            "memory.persistent_max_patterns",
            memory.persistent_max_patterns as f64,
            50.0,
            2000.0,
        )?;

        check_range(
            "execution.auto_execute_threshold",
            self.execution.auto_execute_threshold as f64,
            0.0,
            100.0,
        )?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_nan() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}
