//! Recent shell history.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

fn zsh_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^: *\d+:\d+;").expect("valid regex"))
}

/// `$HISTFILE`, then `~/.bash_history`, then `~/.zsh_history`; the first that exists.
pub fn history_file() -> Option<PathBuf> {
    let from_env = env::var_os("HISTFILE").map(PathBuf::from);
    let home = dirs::home_dir();
    let defaults = [".bash_history", ".zsh_history"]
        .into_iter()
        .filter_map(|name| home.as_ref().map(|h| h.join(name)));
    from_env.into_iter().chain(defaults).find(|path| path.is_file())
}

/// The last `length` commands in `contents`, oldest first.
pub fn parse_history(contents: &str, length: usize) -> Vec<String> {
    let commands: Vec<String> = contents
        .lines()
        .map(|line| zsh_prefix().replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    let start = commands.len().saturating_sub(length);
    commands[start..].to_vec()
}

/// Read the last `length` commands from `path`. Failures yield nothing.
pub fn read_history(path: &Path, length: usize) -> Vec<String> {
    if length == 0 {
        return Vec::new();
    }
    match fs::read(path) {
        Ok(bytes) => parse_history(&String::from_utf8_lossy(&bytes), length),
        Err(e) => {
            debug!("cannot read shell history {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

pub fn format_history(commands: &[String]) -> String {
    if commands.is_empty() {
        return String::new();
    }
    let mut lines = vec!["Recent shell commands:".to_string()];
    lines.extend(commands.iter().map(|cmd| format!("  - {}", cmd)));
    lines.join("\n")
}
