//! Context settings as they appear under `context:` in the config file.

use serde::{Deserialize, Serialize};

/// Which collectors run and how much of their output reaches the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextSettings {
    pub include_history: bool,
    pub history_length: usize,
    pub include_env_vars: bool,
    pub include_git_state: bool,
    pub include_file_listing: bool,
    pub file_listing_max_files: usize,
    pub file_listing_max_depth: usize,
    pub file_listing_show_hidden: bool,
    pub include_session_memory: bool,
    pub include_directory_memory: bool,
    pub include_preferences_memory: bool,
    /// Token budget for all sections together.
    pub max_context_tokens: i64,
    /// Sections scoring below this against the query are dropped. Zero disables filtering.
    pub context_relevance_threshold: f64,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            include_history: true,
            history_length: 10,
            include_env_vars: true,
            include_git_state: true,
            include_file_listing: true,
            file_listing_max_files: 20,
            file_listing_max_depth: 1,
            file_listing_show_hidden: false,
            include_session_memory: true,
            include_directory_memory: true,
            include_preferences_memory: true,
            max_context_tokens: 4000,
            context_relevance_threshold: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: ContextSettings =
            serde_json::from_str(r#"{"history_length": 3, "include_env_vars": false}"#).unwrap();
        assert_eq!(settings.history_length, 3);
        assert!(!settings.include_env_vars);
        assert_eq!(settings.max_context_tokens, 4000);
        assert!(settings.include_preferences_memory);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_json::from_str::<ContextSettings>(r#"{"include_gits": true}"#).is_err());
    }
}
