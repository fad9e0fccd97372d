//! Relevance scoring and token budgeting for context sections.

use std::collections::HashSet;
use std::sync::OnceLock;

use hai_ai::{ContextSection, SectionKind};
use regex::Regex;

/// Boost applied per domain keyword shared by query and section.
const KEYWORD_BOOST: f64 = 0.1;

/// Minimum remaining budget for a section to be truncated instead of dropped.
const MIN_TRUNCATION_TOKENS: i64 = 20;

/// Largest cwd section kept when the budget is zero or negative.
const MIN_CWD_TOKENS: i64 = 10;

const TRUNCATION_MARKER: &str = "\n...";

const DOMAIN_KEYWORDS: &[&str] = &[
    "git", "branch", "commit", "status", "diff", "push", "pull", "file", "directory", "folder",
    "path", "python", "node", "npm", "pip", "uv", "test", "build", "run", "command",
];

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w+\b").expect("valid regex"))
}

fn words(text: &str) -> HashSet<String> {
    word_regex()
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Rough token count: one token per four characters, at least one for
/// non-empty text.
pub fn estimate_tokens(text: &str) -> i64 {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() as i64 / 4).max(1)
}

/// Share of query words present in `content`, plus a small boost for shared
/// domain keywords. Always in `[0, 1]`.
pub fn calculate_relevance(query: &str, content: &str) -> f64 {
    let query_words = words(query);
    if query_words.is_empty() {
        return 0.0;
    }
    let content_words = words(content);
    let overlap = query_words.intersection(&content_words).count() as f64;
    let mut score = overlap / query_words.len() as f64;

    for keyword in DOMAIN_KEYWORDS {
        if query_words.contains(*keyword) && content_words.contains(*keyword) {
            score += KEYWORD_BOOST;
        }
    }
    score.min(1.0)
}

/// Drop sections scoring below `threshold` against `query`.
///
/// The cwd section always survives. A zero threshold, or a query without
/// words, disables the filter.
pub fn filter_by_relevance(
    sections: Vec<ContextSection>,
    query: &str,
    threshold: f64,
) -> Vec<ContextSection> {
    if threshold <= 0.0 || words(query).is_empty() {
        return sections;
    }
    sections
        .into_iter()
        .filter(|section| {
            section.kind == SectionKind::Cwd
                || calculate_relevance(query, &section.content) >= threshold
        })
        .collect()
}

/// Cut `content` to roughly `tokens` tokens at a line boundary.
fn truncate_to_tokens(content: &str, tokens: i64) -> String {
    let max_chars = (tokens.max(0) as usize) * 4;
    let head: String = content.chars().take(max_chars).collect();
    let head = match head.rfind('\n') {
        Some(pos) => &head[..pos],
        None => head.as_str(),
    };
    format!("{}{}", head, TRUNCATION_MARKER)
}

/// Keep the highest-priority sections that fit in `max_tokens`.
///
/// Sections are returned in priority order. The first section that does not
/// fit is truncated when more than a few tokens remain; otherwise it is
/// dropped and smaller sections still get a chance.
pub fn budget_context(mut sections: Vec<ContextSection>, max_tokens: i64) -> Vec<ContextSection> {
    sections.sort_by_key(|section| std::cmp::Reverse(section.kind.priority()));

    if max_tokens <= 0 {
        return sections
            .into_iter()
            .filter(|s| s.kind == SectionKind::Cwd && estimate_tokens(&s.content) <= MIN_CWD_TOKENS)
            .take(1)
            .collect();
    }

    let mut remaining = max_tokens;
    let mut kept = Vec::new();
    for section in sections {
        if remaining <= 0 {
            break;
        }
        let cost = estimate_tokens(&section.content);
        if cost <= remaining {
            remaining -= cost;
            kept.push(section);
        } else if remaining > MIN_TRUNCATION_TOKENS {
            let content = truncate_to_tokens(&section.content, remaining);
            kept.push(ContextSection::new(section.kind, content));
            remaining = 0;
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(kind: SectionKind, content: &str) -> ContextSection {
        ContextSection::new(kind, content)
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("ab"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(40)), 10);
    }

    #[test]
    fn test_relevance_overlap() {
        assert_eq!(calculate_relevance("", "anything"), 0.0);
        assert_eq!(calculate_relevance("list files", "nothing shared"), 0.0);
        let half = calculate_relevance("show readme", "Files: README.md");
        assert!((half - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_relevance_keyword_boost_capped() {
        let score = calculate_relevance(
            "git branch status",
            "Git Repository: Yes\nBranch: main\nStatus: clean",
        );
        assert_eq!(score, 1.0);

        let boosted = calculate_relevance("git log please", "git repository");
        assert!((boosted - (1.0 / 3.0 + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_filter_keeps_cwd() {
        let sections = vec![
            section(SectionKind::Cwd, "Current directory: /tmp"),
            section(SectionKind::Git, "Git Repository: Yes\nBranch: main"),
            section(SectionKind::Environment, "Environment:\n  SHELL=/bin/zsh"),
        ];
        let kept = filter_by_relevance(sections.clone(), "switch git branch", 0.3);
        let kinds: Vec<_> = kept.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SectionKind::Cwd, SectionKind::Git]);

        assert_eq!(filter_by_relevance(sections.clone(), "switch git branch", 0.0).len(), 3);
        assert_eq!(filter_by_relevance(sections, "???", 0.3).len(), 3);
    }

    #[test]
    fn test_budget_keeps_all_when_fits() {
        let sections = vec![
            section(SectionKind::Files, "Files in /tmp:\n  a"),
            section(SectionKind::Cwd, "Current directory: /tmp"),
        ];
        let kept = budget_context(sections, 4000);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].kind, SectionKind::Cwd);
    }

    #[test]
    fn test_budget_truncates_at_line_boundary() {
        let long = (0..50)
            .map(|n| format!("  entry number {n:02}"))
            .collect::<Vec<_>>()
            .join("\n");
        let sections = vec![
            section(SectionKind::Cwd, &"c".repeat(40)),
            section(SectionKind::Files, &long),
        ];
        let kept = budget_context(sections, 40);
        assert_eq!(kept.len(), 2);
        let files = &kept[1].content;
        assert!(files.ends_with("\n..."));
        assert!(files.len() < long.len());
        assert!(files.starts_with("  entry number 00\n"));
        for line in files.lines().filter(|l| *l != "...") {
            assert!(line.starts_with("  entry number "));
            assert_eq!(line.len(), "  entry number 00".len());
        }
    }

    #[test]
    fn test_budget_drops_when_little_remains() {
        let sections = vec![
            section(SectionKind::Cwd, &"c".repeat(80)),
            section(SectionKind::Git, &"g".repeat(400)),
            section(SectionKind::Preferences, "p"),
        ];
        let kept = budget_context(sections, 30);
        let kinds: Vec<_> = kept.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SectionKind::Cwd, SectionKind::Preferences]);
    }

    #[test]
    fn test_budget_zero_keeps_short_cwd_only() {
        let sections = vec![
            section(SectionKind::Cwd, "cwd: /tmp"),
            section(SectionKind::Git, "git"),
        ];
        let kept = budget_context(sections.clone(), 0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].kind, SectionKind::Cwd);

        let long_cwd = vec![section(SectionKind::Cwd, &"c".repeat(100))];
        assert!(budget_context(long_cwd, -5).is_empty());
    }
}
