//! User-wide command usage stored in `~/.hai/preferences.json`.

use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{truncate_for_display, MemoryError};

/// Default number of distinct commands tracked.
pub const DEFAULT_MAX_PATTERNS: usize = 500;

/// Length of the frequent-operations list.
pub const FREQUENT_OPERATIONS: usize = 10;

/// Commands listed in prompt context.
const CONTEXT_FREQUENT: usize = 3;

/// Usage counts and style choices that follow the user across projects.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistentPreferences {
    command_patterns: IndexMap<String, u64>,
    pub style_preferences: Map<String, Value>,
    frequent_operations: Vec<String>,
    max_patterns: usize,
    path: Option<PathBuf>,
}

impl Default for PersistentPreferences {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PATTERNS)
    }
}

impl PersistentPreferences {
    /// Preferences backed by `~/.hai/preferences.json`.
    pub fn new(max_patterns: usize) -> Self {
        let path = dirs::home_dir().map(|home| home.join(".hai").join("preferences.json"));
        Self::with_path_opt(max_patterns, path)
    }

    /// Preferences backed by an explicit file.
    pub fn with_path(max_patterns: usize, path: impl Into<PathBuf>) -> Self {
        Self::with_path_opt(max_patterns, Some(path.into()))
    }

    fn with_path_opt(max_patterns: usize, path: Option<PathBuf>) -> Self {
        Self {
            command_patterns: IndexMap::new(),
            style_preferences: Map::new(),
            frequent_operations: Vec::new(),
            max_patterns,
            path,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load from disk. Problems leave the current state untouched.
    pub fn load(&mut self) {
        let Some(path) = self.path.clone() else {
            debug!("no home directory; preferences stay empty");
            return;
        };
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("no preferences at {}: {}", path.display(), e);
                return;
            }
        };
        let data = match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(data)) => data,
            Ok(_) => {
                debug!("ignoring non-object preferences at {}", path.display());
                return;
            }
            Err(e) => {
                debug!("ignoring malformed preferences at {}: {}", path.display(), e);
                return;
            }
        };

        self.command_patterns = data
            .get("command_patterns")
            .and_then(Value::as_object)
            .map(|patterns| {
                patterns
                    .iter()
                    .filter_map(|(cmd, count)| Some((cmd.clone(), count.as_u64()?)))
                    .collect()
            })
            .unwrap_or_default();
        self.style_preferences = data
            .get("style_preferences")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        self.enforce_capacity();
        self.update_frequent_operations();
    }

    /// Write to disk, creating the parent directory if needed.
    pub fn save(&self) -> Result<(), MemoryError> {
        let path = self.path.as_ref().ok_or(MemoryError::NoHomeDir)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.to_value())?;
        fs::write(path, json)?;
        debug!("saved preferences to {}", path.display());
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "command_patterns": self.command_patterns,
            "style_preferences": self.style_preferences,
            "frequent_operations": self.frequent_operations,
        })
    }

    /// Count a successful run of `command`. Failed runs are ignored.
    pub fn record_command(&mut self, command: &str, success: bool) {
        if !success {
            return;
        }
        *self.command_patterns.entry(command.to_string()).or_insert(0) += 1;
        self.enforce_capacity();
        self.update_frequent_operations();
    }

    /// Commands ordered by count, highest first; ties by command text.
    fn ranked(&self) -> Vec<(&String, u64)> {
        let mut ranked: Vec<_> = self
            .command_patterns
            .iter()
            .map(|(cmd, count)| (cmd, *count))
            .collect();
        ranked.sort_by_key(|(cmd, count)| (Reverse(*count), *cmd));
        ranked
    }

    fn enforce_capacity(&mut self) {
        if self.command_patterns.len() <= self.max_patterns {
            return;
        }
        let keep: IndexMap<String, u64> = self
            .ranked()
            .into_iter()
            .take(self.max_patterns)
            .map(|(cmd, count)| (cmd.clone(), count))
            .collect();
        self.command_patterns = keep;
    }

    fn update_frequent_operations(&mut self) {
        self.frequent_operations = self.get_frequent_patterns(FREQUENT_OPERATIONS);
    }

    /// The `limit` most used commands.
    pub fn get_frequent_patterns(&self, limit: usize) -> Vec<String> {
        self.ranked()
            .into_iter()
            .take(limit)
            .map(|(cmd, _)| cmd.clone())
            .collect()
    }

    pub fn frequent_operations(&self) -> &[String] {
        &self.frequent_operations
    }

    pub fn usage_count(&self, command: &str) -> u64 {
        self.command_patterns.get(command).copied().unwrap_or(0)
    }

    pub fn pattern_count(&self) -> usize {
        self.command_patterns.len()
    }

    pub fn learn_style(&mut self, key: impl Into<String>, value: Value) {
        self.style_preferences.insert(key.into(), value);
    }

    pub fn clear(&mut self) {
        self.command_patterns.clear();
        self.style_preferences.clear();
        self.frequent_operations.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.command_patterns.is_empty()
    }

    /// Most used commands as prompt text; empty when nothing was recorded.
    pub fn format_for_context(&self) -> String {
        let frequent = self.get_frequent_patterns(CONTEXT_FREQUENT);
        if frequent.is_empty() {
            return String::new();
        }
        let mut lines = vec!["Frequently used commands:".to_string()];
        for cmd in &frequent {
            lines.push(format!("  - {}", truncate_for_display(cmd)));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn prefs(max: usize) -> (tempfile::TempDir, PersistentPreferences) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        (dir, PersistentPreferences::with_path(max, path))
    }

    #[test]
    fn test_failed_commands_ignored() {
        let (_dir, mut p) = prefs(10);
        p.record_command("make", false);
        assert!(p.is_empty());
        assert!(p.frequent_operations().is_empty());
    }

    #[test]
    fn test_counts_accumulate() {
        let (_dir, mut p) = prefs(10);
        p.record_command("ls", true);
        p.record_command("ls", true);
        p.record_command("pwd", true);
        assert_eq!(p.usage_count("ls"), 2);
        assert_eq!(p.frequent_operations(), ["ls", "pwd"]);
    }

    #[test]
    fn test_eviction_keeps_highest_counts() {
        let (_dir, mut p) = prefs(2);
        for _ in 0..3 {
            p.record_command("git status", true);
        }
        p.record_command("ls", true);
        p.record_command("ls", true);
        p.record_command("pwd", true);

        assert_eq!(p.pattern_count(), 2);
        assert_eq!(p.usage_count("git status"), 3);
        assert_eq!(p.usage_count("ls"), 2);
        assert_eq!(p.usage_count("pwd"), 0);
    }

    #[test]
    fn test_ties_break_by_command() {
        let (_dir, mut p) = prefs(10);
        for cmd in ["zz", "aa", "mm"] {
            p.record_command(cmd, true);
        }
        assert_eq!(p.get_frequent_patterns(2), vec!["aa", "mm"]);
    }

    #[test]
    fn test_frequent_operations_capped() {
        let (_dir, mut p) = prefs(100);
        for n in 0..15 {
            p.record_command(&format!("cmd{n}"), true);
        }
        assert_eq!(p.frequent_operations().len(), FREQUENT_OPERATIONS);
    }

    #[test]
    fn test_save_then_load() {
        let (_dir, mut p) = prefs(10);
        p.record_command("cargo build", true);
        p.record_command("cargo build", true);
        p.learn_style("verbosity", Value::from("terse"));
        p.save().unwrap();

        let mut loaded = PersistentPreferences::with_path(10, p.path().unwrap());
        loaded.load();
        assert_eq!(loaded.usage_count("cargo build"), 2);
        assert_eq!(loaded.style_preferences["verbosity"], "terse");
        assert_eq!(loaded.frequent_operations(), ["cargo build"]);
    }

    #[test]
    fn test_load_garbage_keeps_state() {
        let (_dir, mut p) = prefs(10);
        fs::write(p.path().unwrap(), "not json").unwrap();
        p.record_command("ls", true);
        p.load();
        assert_eq!(p.usage_count("ls"), 1);
    }

    #[test]
    fn test_load_skips_bad_counts() {
        let (_dir, mut p) = prefs(10);
        fs::write(
            p.path().unwrap(),
            r#"{"command_patterns": {"ls": 4, "pwd": "many"}, "style_preferences": 3}"#,
        )
        .unwrap();
        p.load();
        assert_eq!(p.usage_count("ls"), 4);
        assert_eq!(p.usage_count("pwd"), 0);
        assert!(p.style_preferences.is_empty());
    }

    #[test]
    fn test_format_for_context() {
        let (_dir, mut p) = prefs(10);
        assert_eq!(p.format_for_context(), "");
        for cmd in ["a", "b", "c", "d"] {
            p.record_command(cmd, true);
        }
        assert_eq!(
            p.format_for_context(),
            "Frequently used commands:\n  - a\n  - b\n  - c"
        );
    }
}
