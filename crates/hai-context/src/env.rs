//! Environment variables that are safe to show a model.

/// Name fragments that mark a variable as sensitive. Matching is
/// case-insensitive and anywhere in the name.
pub const SENSITIVE_MARKERS: &[&str] = &[
    "KEY",
    "SECRET",
    "TOKEN",
    "PASSWORD",
    "PASSWD",
    "CREDENTIAL",
    "AUTH",
    "PRIVATE",
    "SESSION",
    "COOKIE",
    "API",
];

/// Listed first, in this order, when present.
const HIGHLIGHTED: &[&str] = &[
    "SHELL",
    "USER",
    "HOME",
    "LANG",
    "TERM",
    "EDITOR",
    "VIRTUAL_ENV",
    "CONDA_DEFAULT_ENV",
    "NODE_ENV",
    "PATH",
];

/// Most variables included in the section.
pub const MAX_ENV_VARS: usize = 15;

const MAX_VALUE_LEN: usize = 100;

pub fn is_sensitive(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    SENSITIVE_MARKERS.iter().any(|marker| upper.contains(marker))
}

fn shorten(value: &str) -> String {
    if value.chars().count() <= MAX_VALUE_LEN {
        return value.to_string();
    }
    let head: String = value.chars().take(MAX_VALUE_LEN - 3).collect();
    format!("{}...", head)
}

/// Non-sensitive variables: highlighted names first, the rest by name.
pub fn filter_vars(vars: impl IntoIterator<Item = (String, String)>) -> Vec<(String, String)> {
    let mut kept: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(name, _)| !name.is_empty() && !is_sensitive(name))
        .collect();
    kept.sort_by(|(a, _), (b, _)| {
        let rank = |name: &str| {
            HIGHLIGHTED
                .iter()
                .position(|h| *h == name)
                .unwrap_or(HIGHLIGHTED.len())
        };
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    });
    kept.truncate(MAX_ENV_VARS);
    kept
}

/// Prompt text for the given variables; empty when none survive filtering.
pub fn format_env(vars: impl IntoIterator<Item = (String, String)>) -> String {
    let kept = filter_vars(vars);
    if kept.is_empty() {
        return String::new();
    }
    let mut lines = vec!["Environment:".to_string()];
    for (name, value) in kept {
        lines.push(format!("  {}={}", name, shorten(&value)));
    }
    lines.join("\n")
}
