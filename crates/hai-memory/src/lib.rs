//! # hai memory
//!
//! Three bounded stores that give the model a sense of history:
//!
//! - **Session**: interactions of the current process, never persisted.
//! - **Directory**: commands learned per project, in `<root>/.hai/context.json`.
//! - **Preferences**: user-wide usage counts, in `~/.hai/preferences.json`.
//!
//! [`MemoryManager`] is the only entry point the rest of hai uses. Memory is
//! best effort: I/O failures are logged and never reach the user.

mod directory;
mod manager;
mod preferences;
mod session;

use thiserror::Error;

pub use directory::{DirectoryMemory, MAX_ROOT_SEARCH_DEPTH, PROJECT_MARKERS};
pub use manager::{MemoryContext, MemoryManager, MemorySettings, MemoryStats};
pub use preferences::{PersistentPreferences, FREQUENT_OPERATIONS};
pub use session::{Interaction, SessionMemory};

/// Items shown per tier when formatting memory for a prompt.
pub const CONTEXT_VIEW_ITEMS: usize = 5;

/// Longest command shown in prompt context before truncation.
const DISPLAY_WIDTH: usize = 50;

/// Failure persisting a memory tier.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not determine home directory")]
    NoHomeDir,
}

/// Seconds since the Unix epoch.
pub(crate) fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

pub(crate) fn truncate_for_display(text: &str) -> String {
    if text.chars().count() <= DISPLAY_WIDTH {
        return text.to_string();
    }
    let head: String = text.chars().take(DISPLAY_WIDTH - 3).collect();
    format!("{}...", head)
}
