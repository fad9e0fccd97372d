//! Context handed to providers alongside the user's prompt.

use serde::{Deserialize, Serialize};

/// Where a context section came from. Ordering here is also budget priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Cwd,
    Git,
    ShellHistory,
    Environment,
    Files,
    SessionMemory,
    DirectoryMemory,
    Preferences,
}

impl SectionKind {
    /// Budget priority; higher is kept first.
    pub fn priority(&self) -> u8 {
        match self {
            SectionKind::Cwd => 10,
            SectionKind::Git => 9,
            SectionKind::ShellHistory => 7,
            SectionKind::Environment => 6,
            SectionKind::Files => 5,
            SectionKind::SessionMemory => 4,
            SectionKind::DirectoryMemory => 3,
            SectionKind::Preferences => 2,
        }
    }
}

/// One formatted block of context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSection {
    pub kind: SectionKind,
    pub content: String,
}

impl ContextSection {
    pub fn new(kind: SectionKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }
}

/// Assembled, budgeted context for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    pub sections: Vec<ContextSection>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style section append; empty content is ignored.
    pub fn with_section(mut self, kind: SectionKind, content: impl Into<String>) -> Self {
        self.push(kind, content);
        self
    }

    pub fn push(&mut self, kind: SectionKind, content: impl Into<String>) {
        let content = content.into();
        if !content.trim().is_empty() {
            self.sections.push(ContextSection::new(kind, content));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, kind: SectionKind) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.content.as_str())
    }

    /// Render all sections, one block per line group.
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(|s| s.content.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sections_ignored() {
        let ctx = PromptContext::new()
            .with_section(SectionKind::Cwd, "Current directory: /tmp")
            .with_section(SectionKind::Git, "   ");
        assert_eq!(ctx.sections.len(), 1);
        assert_eq!(ctx.get(SectionKind::Git), None);
    }

    #[test]
    fn test_render_joins_in_order() {
        let ctx = PromptContext::new()
            .with_section(SectionKind::Cwd, "Current directory: /tmp\n")
            .with_section(SectionKind::Git, "Git Repository: Yes");
        assert_eq!(ctx.render(), "Current directory: /tmp\nGit Repository: Yes");
    }

    #[test]
    fn test_priorities_descend() {
        assert!(SectionKind::Cwd.priority() > SectionKind::Git.priority());
        assert!(SectionKind::Files.priority() > SectionKind::SessionMemory.priority());
        assert!(SectionKind::DirectoryMemory.priority() > SectionKind::Preferences.priority());
    }
}
