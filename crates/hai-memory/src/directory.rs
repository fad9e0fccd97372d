//! Per-project memory stored in `<project root>/.hai/context.json`.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{now_timestamp, truncate_for_display, MemoryError, CONTEXT_VIEW_ITEMS};

/// Default number of command patterns kept per project.
pub const DEFAULT_MAX_PATTERNS: usize = 100;

/// Directories that mark a project root.
pub const PROJECT_MARKERS: &[&str] = &[".git", ".hai"];

/// How many ancestors `find_project_root` inspects.
pub const MAX_ROOT_SEARCH_DEPTH: usize = 20;

const MEMORY_DIR: &str = ".hai";
const MEMORY_FILE: &str = "context.json";

/// Commands and settings learned for one project.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryMemory {
    pub project_name: Option<String>,
    patterns: IndexSet<String>,
    pub preferences: Map<String, Value>,
    pub last_updated: Option<f64>,
    max_patterns: usize,
}

impl Default for DirectoryMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PATTERNS)
    }
}

impl DirectoryMemory {
    pub fn new(max_patterns: usize) -> Self {
        Self {
            project_name: None,
            patterns: IndexSet::new(),
            preferences: Map::new(),
            last_updated: None,
            max_patterns,
        }
    }

    /// Path of the memory file for `directory`.
    pub fn file_path(directory: &Path) -> PathBuf {
        directory.join(MEMORY_DIR).join(MEMORY_FILE)
    }

    /// Load from `directory`. Missing, unreadable or malformed files leave
    /// the current state untouched.
    pub fn load(&mut self, directory: &Path) {
        let path = Self::file_path(directory);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("no directory memory at {}: {}", path.display(), e);
                return;
            }
        };
        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(data)) => self.apply(&data),
            Ok(_) => debug!("ignoring non-object directory memory at {}", path.display()),
            Err(e) => debug!("ignoring malformed directory memory at {}: {}", path.display(), e),
        }
    }

    /// Take each field that has the right shape; ignore the rest.
    fn apply(&mut self, data: &Map<String, Value>) {
        self.project_name = data
            .get("project_name")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.patterns = data
            .get("patterns")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        self.preferences = data
            .get("preferences")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        self.last_updated = data.get("last_updated").and_then(Value::as_f64);
        self.enforce_capacity();
    }

    /// Write to `directory`, creating `.hai/` if needed.
    pub fn save(&mut self, directory: &Path) -> Result<(), MemoryError> {
        let path = Self::file_path(directory);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.last_updated = Some(now_timestamp());
        let json = serde_json::to_string_pretty(&self.to_value())?;
        fs::write(&path, json)?;
        debug!("saved directory memory to {}", path.display());
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "project_name": self.project_name,
            "patterns": self.patterns,
            "preferences": self.preferences,
            "last_updated": self.last_updated,
        })
    }

    /// Remember `command`. Duplicates keep their original position.
    pub fn add_pattern(&mut self, command: impl Into<String>) {
        self.patterns.insert(command.into());
        self.enforce_capacity();
    }

    fn enforce_capacity(&mut self) {
        if self.max_patterns == 0 {
            self.patterns.clear();
            return;
        }
        while self.patterns.len() > self.max_patterns {
            self.patterns.shift_remove_index(0);
        }
    }

    /// Stored patterns, oldest first.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn update_preference(&mut self, key: impl Into<String>, value: Value) {
        self.preferences.insert(key.into(), value);
    }

    /// Forget patterns and preferences; the project name is kept.
    pub fn clear(&mut self) {
        self.patterns.clear();
        self.preferences.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.preferences.is_empty()
    }

    /// Walk up from `start` to the first directory containing a project marker.
    pub fn find_project_root(start: &Path) -> Option<PathBuf> {
        let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
        start
            .ancestors()
            .take(MAX_ROOT_SEARCH_DEPTH)
            .find(|dir| PROJECT_MARKERS.iter().any(|m| dir.join(m).exists()))
            .map(Path::to_path_buf)
    }

    /// Project name and recent patterns as prompt text.
    pub fn format_for_context(&self) -> String {
        let mut lines = Vec::new();
        if let Some(name) = &self.project_name {
            lines.push(format!("Project: {}", name));
        }
        if !self.patterns.is_empty() {
            lines.push("Common commands:".to_string());
            let skip = self.patterns.len().saturating_sub(CONTEXT_VIEW_ITEMS);
            for pattern in self.patterns.iter().skip(skip) {
                lines.push(format!("  - {}", truncate_for_display(pattern)));
            }
        }
        lines.join("\n")
    }
}
