//! Gathers every enabled collector into one budgeted [`PromptContext`].

use std::env;
use std::path::{Path, PathBuf};

use hai_ai::{ContextSection, PromptContext, SectionKind};
use hai_memory::MemoryManager;
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

use crate::config::ContextSettings;
use crate::cwd::CwdInfo;
use crate::env::format_env;
use crate::files::{list_files, ListOptions};
use crate::git::GitProbe;
use crate::history::{format_history, history_file, read_history};
use crate::relevance::{budget_context, estimate_tokens, filter_by_relevance};

/// Collects context for a query.
///
/// The collectors are independent and read-only, so they run concurrently;
/// filesystem work goes to the blocking pool.
#[derive(Debug)]
pub struct ContextAssembler {
    settings: ContextSettings,
    cwd: PathBuf,
    git: GitProbe,
    history_path: Option<PathBuf>,
}

impl ContextAssembler {
    /// Assembler for the process working directory.
    pub fn new(settings: ContextSettings) -> Self {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            settings,
            cwd,
            git: GitProbe::new(),
            history_path: history_file(),
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_git_probe(mut self, git: GitProbe) -> Self {
        self.git = git;
        self
    }

    /// Read shell history from `path` instead of the detected history file.
    pub fn with_history_path(mut self, path: Option<PathBuf>) -> Self {
        self.history_path = path;
        self
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn git_probe(&self) -> &GitProbe {
        &self.git
    }

    /// Run the collectors. Sections come back unfiltered and unbudgeted.
    pub async fn collect_sections(
        &self,
        query: &str,
        memory: Option<&MemoryManager>,
    ) -> Vec<ContextSection> {
        let settings = &self.settings;

        let cwd = {
            let dir = self.cwd.clone();
            blocking("cwd", move || CwdInfo::collect(&dir).format())
        };

        let git = async {
            if !settings.include_git_state {
                return None;
            }
            self.git.collect(&self.cwd).await.format()
        };

        let files = async {
            if !settings.include_file_listing || settings.file_listing_max_files == 0 {
                return None;
            }
            let root = self.cwd.clone();
            let query = query.to_string();
            let options = ListOptions {
                max_files: settings.file_listing_max_files,
                max_depth: settings.file_listing_max_depth,
                show_hidden: settings.file_listing_show_hidden,
            };
            let listing = blocking("file listing", move || {
                list_files(&root, options, Some(&query))
            })
            .await?;
            match listing {
                Ok(listing) => Some(listing.format()),
                Err(e) => {
                    debug!("cannot list {}: {}", self.cwd.display(), e);
                    None
                }
            }
        };

        let history = async {
            if !settings.include_history || settings.history_length == 0 {
                return None;
            }
            let path = self.history_path.clone()?;
            let length = settings.history_length;
            blocking("shell history", move || {
                format_history(&read_history(&path, length))
            })
            .await
        };

        let (cwd, git, files, history) = tokio::join!(cwd, git, files, history);

        let environment = settings.include_env_vars.then(|| {
            format_env(
                env::vars_os()
                    .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
            )
        });

        let mut sections = Vec::new();
        let mut push = |kind: SectionKind, content: Option<String>| {
            if let Some(content) = content.filter(|c| !c.trim().is_empty()) {
                sections.push(ContextSection::new(kind, content));
            }
        };
        push(SectionKind::Cwd, cwd);
        push(SectionKind::Git, git);
        push(SectionKind::ShellHistory, history);
        push(SectionKind::Environment, environment);
        push(SectionKind::Files, files);

        if let Some(memory) = memory {
            let context = memory.collect_memory_context();
            if settings.include_session_memory {
                push(SectionKind::SessionMemory, context.session);
            }
            if settings.include_directory_memory {
                push(SectionKind::DirectoryMemory, context.directory);
            }
            if settings.include_preferences_memory {
                push(SectionKind::Preferences, context.preferences);
            }
        }
        sections
    }

    /// Collect, filter by relevance to `query`, and fit into the token budget.
    pub async fn assemble(&self, query: &str, memory: Option<&MemoryManager>) -> PromptContext {
        let sections = self.collect_sections(query, memory).await;
        let collected = sections.len();
        let sections = if query.trim().is_empty() {
            sections
        } else {
            filter_by_relevance(sections, query, self.settings.context_relevance_threshold)
        };
        let relevant = sections.len();
        let sections = budget_context(sections, self.settings.max_context_tokens);

        let tokens: i64 = sections.iter().map(|s| estimate_tokens(&s.content)).sum();
        debug!(
            collected,
            relevant,
            kept = sections.len(),
            tokens,
            "assembled context"
        );
        PromptContext { sections }
    }
}

/// Run `f` on the blocking pool; a panicked task reads as no output.
async fn blocking<T, F>(label: &str, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match spawn_blocking(f).await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} collector failed: {}", label, e);
            None
        }
    }
}
