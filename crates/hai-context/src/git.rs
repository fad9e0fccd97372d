//! Git branch and dirty-state probe.

use std::io;
use std::path::Path;
use std::process::Output;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Upper bound for every git invocation.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git not found")]
    NotFound,
    #[error("git {0} timed out")]
    Timeout(String),
    #[error("failed to run git: {0}")]
    Io(#[from] io::Error),
}

/// Repository state of a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitState {
    pub is_repo: bool,
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub staged: bool,
    pub unstaged: bool,
    pub untracked: bool,
}

impl GitState {
    pub fn is_clean(&self) -> bool {
        !(self.staged || self.unstaged || self.untracked)
    }

    /// Prompt text; `None` outside a repository.
    pub fn format(&self) -> Option<String> {
        if !self.is_repo {
            return None;
        }
        let mut lines = vec!["Git Repository: Yes".to_string()];
        match (&self.branch, &self.commit) {
            (Some(branch), Some(commit)) => lines.push(format!("Branch: {} ({})", branch, commit)),
            (Some(branch), None) => lines.push(format!("Branch: {}", branch)),
            (None, Some(commit)) => lines.push(format!("Commit: {}", commit)),
            (None, None) => {}
        }

        let status = if self.is_clean() {
            "clean".to_string()
        } else {
            let mut changes = Vec::new();
            if self.staged {
                changes.push("staged changes");
            }
            if self.unstaged {
                changes.push("unstaged changes");
            }
            if self.untracked {
                changes.push("untracked files");
            }
            changes.join(", ")
        };
        lines.push(format!("Status: {}", status));
        Some(lines.join("\n"))
    }
}

/// Flags from `git status --porcelain`: (staged, unstaged, untracked).
pub fn parse_porcelain(output: &str) -> (bool, bool, bool) {
    let mut staged = false;
    let mut unstaged = false;
    let mut untracked = false;
    for line in output.lines() {
        let bytes = line.as_bytes();
        if bytes.len() < 2 {
            continue;
        }
        if bytes.starts_with(b"??") {
            untracked = true;
            continue;
        }
        if bytes[0] != b' ' && bytes[0] != b'?' {
            staged = true;
        }
        if bytes[1] != b' ' {
            unstaged = true;
        }
    }
    (staged, unstaged, untracked)
}

/// Runs git with a timeout and remembers whether git exists.
///
/// Only definitive answers are cached. A probe that times out is retried on
/// the next call.
#[derive(Debug)]
pub struct GitProbe {
    program: String,
    timeout: Duration,
    available: Mutex<Option<bool>>,
}

impl Default for GitProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl GitProbe {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: GIT_TIMEOUT,
            available: Mutex::new(None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn cached(&self) -> Option<bool> {
        self.available.lock().ok().and_then(|cached| *cached)
    }

    fn remember(&self, available: bool) {
        if let Ok(mut cached) = self.available.lock() {
            *cached = Some(available);
        }
    }

    /// Forget the cached availability.
    pub fn reset(&self) {
        if let Ok(mut cached) = self.available.lock() {
            *cached = None;
        }
    }

    pub async fn is_available(&self) -> bool {
        if let Some(available) = self.cached() {
            return available;
        }
        match self.run(Path::new("."), &["--version"]).await {
            Ok(output) => {
                let available = output.status.success();
                self.remember(available);
                available
            }
            Err(GitError::NotFound) => {
                debug!("{} not found on PATH", self.program);
                self.remember(false);
                false
            }
            Err(e) => {
                debug!("git availability probe failed: {}", e);
                false
            }
        }
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> Result<Output, GitError> {
        debug!(args = ?args, dir = %dir.display(), "Running git command");

        let child = Command::new(&self.program)
            .args(args)
            .current_dir(dir)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => Err(GitError::NotFound),
            Ok(Err(e)) => Err(GitError::Io(e)),
            Err(_) => Err(GitError::Timeout(args.join(" "))),
        }
    }

    /// Trimmed stdout of a successful command.
    async fn stdout(&self, dir: &Path, args: &[&str]) -> Result<Option<String>, GitError> {
        let output = self.run(dir, args).await?;
        if !output.status.success() {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(text))
    }

    async fn query(&self, dir: &Path) -> Result<GitState, GitError> {
        let inside = self
            .stdout(dir, &["rev-parse", "--is-inside-work-tree"])
            .await?;
        if inside.as_deref() != Some("true") {
            return Ok(GitState::default());
        }

        let branch = self
            .stdout(dir, &["rev-parse", "--abbrev-ref", "HEAD"])
            .await?
            .filter(|b| !b.is_empty());
        let commit = self
            .stdout(dir, &["rev-parse", "--short", "HEAD"])
            .await?
            .filter(|c| !c.is_empty());
        let status = self
            .stdout(dir, &["status", "--porcelain"])
            .await?
            .unwrap_or_default();
        let (staged, unstaged, untracked) = parse_porcelain(&status);

        Ok(GitState {
            is_repo: true,
            branch,
            commit,
            staged,
            unstaged,
            untracked,
        })
    }

    /// Repository state of `dir`. Every failure reads as "not a repository".
    pub async fn collect(&self, dir: &Path) -> GitState {
        if !self.is_available().await {
            return GitState::default();
        }
        match self.query(dir).await {
            Ok(state) => state,
            Err(e) => {
                warn!("git probe failed in {}: {}", dir.display(), e);
                GitState::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_porcelain() {
        assert_eq!(parse_porcelain(""), (false, false, false));
        assert_eq!(parse_porcelain("M  src/lib.rs"), (true, false, false));
        assert_eq!(parse_porcelain(" M src/lib.rs"), (false, true, false));
        assert_eq!(parse_porcelain("MM src/lib.rs"), (true, true, false));
        assert_eq!(parse_porcelain("?? notes.txt"), (false, false, true));
        assert_eq!(
            parse_porcelain("A  new.rs\n?? scratch\n D old.rs"),
            (true, true, true)
        );
    }

    #[test]
    fn test_format_clean() {
        let state = GitState {
            is_repo: true,
            branch: Some("main".to_string()),
            commit: Some("abc1234".to_string()),
            ..GitState::default()
        };
        assert_eq!(
            state.format().unwrap(),
            "Git Repository: Yes\nBranch: main (abc1234)\nStatus: clean"
        );
    }

    #[test]
    fn test_format_dirty() {
        let state = GitState {
            is_repo: true,
            branch: Some("dev".to_string()),
            unstaged: true,
            untracked: true,
            ..GitState::default()
        };
        let text = state.format().unwrap();
        assert!(text.contains("Branch: dev\n"));
        assert!(text.ends_with("Status: unstaged changes, untracked files"));
    }

    #[test]
    fn test_format_outside_repo() {
        assert_eq!(GitState::default().format(), None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_cached() {
        let probe = GitProbe::with_program("hai-test-no-such-git-binary");
        assert!(!probe.is_available().await);
        assert_eq!(probe.cached(), Some(false));

        let dir = tempdir().unwrap();
        assert_eq!(probe.collect(dir.path()).await, GitState::default());

        probe.reset();
        assert_eq!(probe.cached(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_not_cached() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let script = dir.path().join("slow-git");
        std::fs::write(&script, "#!/bin/sh\nsleep 2\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let probe = GitProbe::with_program(script.to_string_lossy().into_owned())
            .with_timeout(Duration::from_millis(100));
        assert!(!probe.is_available().await);
        assert_eq!(probe.cached(), None);
    }

    #[tokio::test]
    async fn test_plain_directory_is_not_repo() {
        let probe = GitProbe::new();
        if !probe.is_available().await {
            return;
        }
        let dir = tempdir().unwrap();
        let state = probe.collect(dir.path()).await;
        assert!(!state.is_repo);
    }
}
