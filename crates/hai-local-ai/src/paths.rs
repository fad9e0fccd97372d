//! Path utilities for the hai data directory.

use std::path::PathBuf;

/// Get the hai data directory (~/.hai/).
pub fn hai_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".hai"))
}

/// Get the bin directory (~/.hai/bin/).
pub fn bin_dir() -> Option<PathBuf> {
    hai_data_dir().map(|dir| dir.join("bin"))
}

/// Get the default config file path (~/.hai/config.yaml).
pub fn config_path() -> Option<PathBuf> {
    hai_data_dir().map(|dir| dir.join("config.yaml"))
}

fn server_binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "llama-server.exe"
    } else {
        "llama-server"
    }
}

/// Get the path to the bundled llama-server binary (~/.hai/bin/llama-server).
pub fn bundled_server_path() -> Option<PathBuf> {
    bin_dir().map(|dir| dir.join(server_binary_name()))
}

/// Locate llama-server: the bundled binary first, then `PATH`.
pub fn find_llama_server() -> Option<PathBuf> {
    if let Some(bundled) = bundled_server_path() {
        if bundled.exists() {
            return Some(bundled);
        }
    }
    which::which(server_binary_name()).ok()
}

/// Expand a leading `~/` in a user-supplied path.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
