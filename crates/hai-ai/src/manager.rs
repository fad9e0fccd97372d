//! Runtime provider registry and switching.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{ConfigurationError, ProviderKind, ProviderSelection, ProvidersConfig};
use crate::provider::{create_provider, FailureCause, Provider, ProviderError};

/// Result of a switch listener. Errors are logged and otherwise ignored.
pub type ListenerResult = Result<(), Box<dyn Error + Send + Sync>>;

type SwitchListener = Box<dyn Fn(ProviderKind) -> ListenerResult + Send + Sync>;

/// Handle returned by [`ProviderManager::on_switch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Summary of one configured provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub kind: ProviderKind,
    pub model: String,
    pub detail: Option<String>,
}

impl fmt::Display for ProviderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.model)?;
        if let Some(detail) = &self.detail {
            write!(f, " [{}]", detail)?;
        }
        Ok(())
    }
}

/// Owns the provider configuration, the current selection and a cached
/// provider instance.
///
/// Switching takes `&mut self`, so it can happen between generation calls
/// but never during one.
pub struct ProviderManager {
    providers: ProvidersConfig,
    current: ProviderKind,
    instance: Option<Arc<dyn Provider>>,
    listeners: Vec<(CallbackId, SwitchListener)>,
    next_callback: u64,
}

impl ProviderManager {
    /// Create a manager whose current provider is the selection's primary.
    pub fn new(
        providers: ProvidersConfig,
        selection: &ProviderSelection,
    ) -> Result<Self, ConfigurationError> {
        providers.validate()?;
        selection.validate(&providers)?;
        Ok(Self {
            providers,
            current: selection.primary(),
            instance: None,
            listeners: Vec::new(),
            next_callback: 0,
        })
    }

    pub fn current_kind(&self) -> ProviderKind {
        self.current
    }

    pub fn providers(&self) -> &ProvidersConfig {
        &self.providers
    }

    /// Every provider with a configuration block, in display order.
    pub fn list_available_providers(&self) -> Vec<ProviderInfo> {
        let mut infos = Vec::new();
        if let Some(c) = &self.providers.openai {
            infos.push(ProviderInfo {
                kind: ProviderKind::OpenAi,
                model: c.model.clone(),
                detail: Some(key_detail(c.api_key().is_some())),
            });
        }
        if let Some(c) = &self.providers.anthropic {
            infos.push(ProviderInfo {
                kind: ProviderKind::Anthropic,
                model: c.model.clone(),
                detail: Some(key_detail(c.api_key().is_some())),
            });
        }
        if let Some(c) = &self.providers.ollama {
            infos.push(ProviderInfo {
                kind: ProviderKind::Ollama,
                model: c.model.clone(),
                detail: Some(c.base_url.clone()),
            });
        }
        if let Some(c) = &self.providers.local {
            infos.push(ProviderInfo {
                kind: ProviderKind::Local,
                model: c.model_path.clone(),
                detail: Some(format!("context {}", c.context_size)),
            });
        }
        infos
    }

    pub fn get_current_provider(&self) -> ProviderInfo {
        self.list_available_providers()
            .into_iter()
            .find(|info| info.kind == self.current)
            .unwrap_or_else(|| ProviderInfo {
                kind: self.current,
                model: "unknown".to_string(),
                detail: None,
            })
    }

    /// Whether `name` is a known provider with a configuration block.
    pub fn is_provider_available(&self, name: &str) -> bool {
        name.parse::<ProviderKind>()
            .map(|kind| self.providers.is_configured(kind))
            .unwrap_or(false)
    }

    /// Switch the current provider.
    ///
    /// Returns `false`, changing nothing, when `name` is unknown or not
    /// configured. Otherwise drops the cached instance and notifies every
    /// listener; a failing listener does not stop the others.
    pub fn switch_provider(&mut self, name: &str) -> bool {
        let Ok(kind) = name.parse::<ProviderKind>() else {
            debug!("refusing switch to unknown provider '{}'", name);
            return false;
        };
        if !self.providers.is_configured(kind) {
            debug!("refusing switch to unconfigured provider '{}'", kind);
            return false;
        }

        self.set_current(kind);
        true
    }

    fn set_current(&mut self, kind: ProviderKind) {
        info!("switching provider to {}", kind);
        self.current = kind;
        self.instance = None;

        for (id, listener) in &self.listeners {
            if let Err(e) = listener(kind) {
                warn!("provider switch listener {:?} failed: {}", id, e);
            }
        }
    }

    /// Register a listener called with the new provider after each switch.
    pub fn on_switch<F>(&mut self, listener: F) -> CallbackId
    where
        F: Fn(ProviderKind) -> ListenerResult + Send + Sync + 'static,
    {
        let id = CallbackId(self.next_callback);
        self.next_callback += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(registered, _)| *registered != id);
        self.listeners.len() != before
    }

    /// Replace the cached instance (used to inject test doubles).
    pub fn set_provider_instance(&mut self, instance: Arc<dyn Provider>) {
        self.instance = Some(instance);
    }

    /// The current provider, created on first use.
    pub fn provider(&mut self) -> Result<Arc<dyn Provider>, ProviderError> {
        if let Some(instance) = &self.instance {
            return Ok(Arc::clone(instance));
        }

        let config = self.providers.get(self.current).ok_or_else(|| {
            ProviderError::new(
                self.current,
                FailureCause::Unavailable,
                "provider is not configured",
            )
        })?;
        let instance = create_provider(config)?;
        self.instance = Some(Arc::clone(&instance));
        Ok(instance)
    }

    /// Resolve the provider to use for `selection`.
    ///
    /// A single selection is used as is. A priority chain probes each
    /// candidate in order and switches to the first available one.
    pub async fn resolve(
        &mut self,
        selection: &ProviderSelection,
    ) -> Result<Arc<dyn Provider>, ProviderError> {
        let ProviderSelection::Priority(candidates) = selection else {
            return self.provider();
        };

        let mut tried = Vec::new();
        for kind in candidates {
            let Some(config) = self.providers.get(*kind) else {
                continue;
            };
            let candidate = match create_provider(config) {
                Ok(candidate) => candidate,
                Err(e) => {
                    debug!("skipping {}: {}", kind, e);
                    tried.push(kind.as_str());
                    continue;
                }
            };
            if candidate.is_available().await {
                if self.current != *kind {
                    self.set_current(*kind);
                }
                self.instance = Some(Arc::clone(&candidate));
                return Ok(candidate);
            }
            debug!("provider {} not available", kind);
            tried.push(kind.as_str());
        }

        Err(ProviderError::new(
            selection.primary(),
            FailureCause::Unavailable,
            format!("no available provider in chain (tried: {})", tried.join(", ")),
        ))
    }
}

fn key_detail(has_key: bool) -> String {
    if has_key {
        "api key set".to_string()
    } else {
        "no api key".to_string()
    }
}
