//! Relevance-ranked, depth-bounded file listing.

use std::cmp::Reverse;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Directories listed but never descended into.
pub const SKIP_DIRS: &[&str] = &["node_modules", "target", "__pycache__", ".git"];

/// Entries examined before the walk stops.
const MAX_SCAN: usize = 5000;

const EXACT_SCORE: u32 = 100;
const PREFIX_SCORE: u32 = 75;
const SUBSTRING_SCORE: u32 = 50;
const WORD_SCORE: u32 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the listing root, `/`-separated.
    pub path: String,
    pub name: String,
    pub is_dir: bool,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListing {
    pub root: PathBuf,
    pub entries: Vec<FileEntry>,
    /// Entries found before truncation.
    pub total: usize,
}

impl FileListing {
    pub fn is_truncated(&self) -> bool {
        self.total > self.entries.len()
    }

    /// Prompt text; empty when nothing is listed.
    pub fn format(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        let header = if self.is_truncated() {
            format!(
                "Files in {} (showing {} of {}):",
                self.root.display(),
                self.entries.len(),
                self.total
            )
        } else {
            format!("Files in {}:", self.root.display())
        };
        let mut lines = vec![header];
        for entry in &self.entries {
            let suffix = if entry.is_dir { "/" } else { "" };
            lines.push(format!("  {}{}", entry.path, suffix));
        }
        lines.join("\n")
    }
}

/// Options for [`list_files`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub max_files: usize,
    /// Top-level entries are depth 0; subdirectories are entered while depth < max_depth.
    pub max_depth: usize,
    pub show_hidden: bool,
}

/// How well `name` matches `query`; zero when it does not.
///
/// Exact name beats prefix, prefix beats substring, and substring beats a
/// match on any single query word. Comparison ignores case.
pub fn score_name(name: &str, query: &str) -> u32 {
    let name = name.to_lowercase();
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return 0;
    }
    if name == query {
        EXACT_SCORE
    } else if name.starts_with(&query) {
        PREFIX_SCORE
    } else if name.contains(&query) {
        SUBSTRING_SCORE
    } else if query
        .split_whitespace()
        .filter(|word| word.len() > 1)
        .any(|word| name.contains(word))
    {
        WORD_SCORE
    } else {
        0
    }
}

/// List `root`, ranking entries against `query` and keeping the best `max_files`.
///
/// Ordering is score descending, then path ascending. Without a query,
/// directories come before files.
pub fn list_files(
    root: &Path,
    options: ListOptions,
    query: Option<&str>,
) -> io::Result<FileListing> {
    let mut entries = Vec::new();
    walk(root, root, 0, options, &mut entries)?;

    let query = query.map(str::trim).filter(|q| !q.is_empty());
    if let Some(query) = query {
        for entry in &mut entries {
            entry.score = score_name(&entry.name, query);
        }
    }
    entries.sort_by(|a, b| {
        let dirs_first = if query.is_none() {
            b.is_dir.cmp(&a.is_dir)
        } else {
            std::cmp::Ordering::Equal
        };
        Reverse(a.score)
            .cmp(&Reverse(b.score))
            .then(dirs_first)
            .then_with(|| a.path.cmp(&b.path))
    });

    let total = entries.len();
    entries.truncate(options.max_files);
    Ok(FileListing {
        root: root.to_path_buf(),
        entries,
        total,
    })
}

fn walk(
    root: &Path,
    dir: &Path,
    depth: usize,
    options: ListOptions,
    out: &mut Vec<FileEntry>,
) -> io::Result<()> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        // Unreadable subdirectories are skipped; an unreadable root is an error.
        Err(e) if depth > 0 => {
            debug!("skipping {}: {}", dir.display(), e);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    for entry in read.flatten() {
        if out.len() >= MAX_SCAN {
            break;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !options.show_hidden && name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let relative = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        out.push(FileEntry {
            path: relative,
            name: name.clone(),
            is_dir,
            score: 0,
        });

        if is_dir && depth < options.max_depth && !SKIP_DIRS.contains(&name.as_str()) {
            walk(root, &path, depth + 1, options, out)?;
        }
    }
    Ok(())
}
