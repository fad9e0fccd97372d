//! Coordination of the three memory tiers.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::directory::{self, DirectoryMemory};
use crate::preferences::{self, PersistentPreferences};
use crate::session::{self, SessionMemory};

/// Memory settings as they appear under `memory:` in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemorySettings {
    pub enabled: bool,
    pub session_enabled: bool,
    pub session_max_interactions: usize,
    pub directory_enabled: bool,
    pub directory_max_patterns: usize,
    pub persistent_enabled: bool,
    pub persistent_max_patterns: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            session_enabled: true,
            session_max_interactions: session::DEFAULT_MAX_INTERACTIONS,
            directory_enabled: true,
            directory_max_patterns: directory::DEFAULT_MAX_PATTERNS,
            persistent_enabled: true,
            persistent_max_patterns: preferences::DEFAULT_MAX_PATTERNS,
        }
    }
}

/// Formatted memory for prompt injection; `None` marks an empty tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryContext {
    pub session: Option<String>,
    pub directory: Option<String>,
    pub preferences: Option<String>,
}

impl MemoryContext {
    pub fn is_empty(&self) -> bool {
        self.session.is_none() && self.directory.is_none() && self.preferences.is_none()
    }
}

/// Tier sizes for `hai memory stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub enabled: bool,
    pub session_count: usize,
    pub directory_patterns: usize,
    pub preference_patterns: usize,
}

impl fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Memory enabled:      {}", self.enabled)?;
        writeln!(f, "Session interactions: {}", self.session_count)?;
        writeln!(f, "Directory patterns:  {}", self.directory_patterns)?;
        write!(f, "Preference patterns: {}", self.preference_patterns)
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Owns every tier. All I/O goes through [`load_all`](Self::load_all) and
/// [`save_all`](Self::save_all); failures there are logged and swallowed.
/// Every method is a no-op while memory is disabled.
#[derive(Debug, Clone)]
pub struct MemoryManager {
    settings: MemorySettings,
    session: SessionMemory,
    directory: DirectoryMemory,
    preferences: PersistentPreferences,
    working_dir: Option<PathBuf>,
}

impl MemoryManager {
    pub fn new(settings: MemorySettings) -> Self {
        let preferences = PersistentPreferences::new(settings.persistent_max_patterns);
        Self::with_preferences(settings, preferences)
    }

    /// Use `path` instead of `~/.hai/preferences.json`.
    pub fn with_preferences_path(settings: MemorySettings, path: impl Into<PathBuf>) -> Self {
        let preferences =
            PersistentPreferences::with_path(settings.persistent_max_patterns, path);
        Self::with_preferences(settings, preferences)
    }

    fn with_preferences(settings: MemorySettings, preferences: PersistentPreferences) -> Self {
        Self {
            session: SessionMemory::new(settings.session_max_interactions),
            directory: DirectoryMemory::new(settings.directory_max_patterns),
            preferences,
            working_dir: None,
            settings,
        }
    }

    /// A manager that never reads, writes or remembers anything.
    pub fn disabled() -> Self {
        Self::new(MemorySettings {
            enabled: false,
            ..MemorySettings::default()
        })
    }

    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn settings(&self) -> &MemorySettings {
        &self.settings
    }

    pub fn session(&self) -> &SessionMemory {
        &self.session
    }

    pub fn directory(&self) -> &DirectoryMemory {
        &self.directory
    }

    pub fn preferences(&self) -> &PersistentPreferences {
        &self.preferences
    }

    /// Directory memory is stored under this project root.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Load persistent tiers, resolving the project from the process cwd.
    pub fn load_all(&mut self) {
        match std::env::current_dir() {
            Ok(cwd) => self.load_all_from(&cwd),
            Err(e) => {
                warn!("cannot determine working directory: {}", e);
                if self.enabled() && self.settings.persistent_enabled {
                    self.preferences.load();
                }
            }
        }
    }

    /// Load persistent tiers, resolving the project from `dir`.
    pub fn load_all_from(&mut self, dir: &Path) {
        if !self.enabled() {
            return;
        }

        if self.settings.persistent_enabled {
            self.preferences.load();
        }

        if self.settings.directory_enabled {
            let root = DirectoryMemory::find_project_root(dir).unwrap_or_else(|| dir.to_path_buf());
            debug!("directory memory root: {}", root.display());
            self.directory.load(&root);
            if self.directory.project_name.is_none() {
                self.directory.project_name = root
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned());
            }
            self.working_dir = Some(root);
        }
    }

    /// Persist the preference and directory tiers.
    ///
    /// Directory memory is only written when it holds something or a file
    /// already exists, so browsing a directory never creates `.hai/`.
    pub fn save_all(&mut self) {
        if !self.enabled() {
            return;
        }

        if self.settings.persistent_enabled {
            if let Err(e) = self.preferences.save() {
                warn!("failed to save preferences: {}", e);
            }
        }

        if self.settings.directory_enabled {
            if let Some(root) = &self.working_dir {
                let exists = DirectoryMemory::file_path(root).exists();
                if !self.directory.is_empty() || exists {
                    if let Err(e) = self.directory.save(root) {
                        warn!("failed to save directory memory in {}: {}", root.display(), e);
                    }
                }
            }
        }
    }

    /// Formatted context from every non-empty tier.
    pub fn collect_memory_context(&self) -> MemoryContext {
        if !self.enabled() {
            return MemoryContext::default();
        }

        MemoryContext {
            session: self
                .settings
                .session_enabled
                .then(|| self.session.format_for_context())
                .and_then(non_empty),
            directory: (self.settings.directory_enabled && !self.directory.is_empty())
                .then(|| self.directory.format_for_context())
                .and_then(non_empty),
            preferences: self
                .settings
                .persistent_enabled
                .then(|| self.preferences.format_for_context())
                .and_then(non_empty),
        }
    }

    /// All tiers joined into one block.
    pub fn format_memory_context(&self) -> String {
        let context = self.collect_memory_context();
        [context.session, context.directory, context.preferences]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Record a finished interaction in every tier.
    ///
    /// `command` is `None` for question answers, which only reach the
    /// session tier. Failed commands are not learned as patterns.
    pub fn update_memory(
        &mut self,
        query: &str,
        command: Option<&str>,
        result_text: &str,
        success: bool,
    ) {
        if !self.enabled() {
            return;
        }

        if self.settings.session_enabled {
            self.session.add_interaction(
                query,
                command.map(str::to_string),
                result_text,
                success,
            );
        }

        let Some(command) = command else {
            return;
        };
        if success && self.settings.directory_enabled {
            self.directory.add_pattern(command);
        }
        if self.settings.persistent_enabled {
            self.preferences.record_command(command, success);
        }
    }

    /// Forget everything in every tier. Call `save_all` to persist.
    pub fn clear_all(&mut self) {
        if !self.enabled() {
            return;
        }
        self.session.clear();
        self.directory.clear();
        self.preferences.clear();
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            enabled: self.enabled(),
            session_count: self.session.len(),
            directory_patterns: self.directory.pattern_count(),
            preference_patterns: self.preferences.pattern_count(),
        }
    }
}
