//! Session memory: recent interactions of the running process.

use serde::{Deserialize, Serialize};

use crate::{now_timestamp, truncate_for_display, CONTEXT_VIEW_ITEMS};

/// Default number of interactions kept.
pub const DEFAULT_MAX_INTERACTIONS: usize = 20;

/// One completed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub query: String,
    /// `None` for question answers.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(rename = "result")]
    pub result_text: String,
    pub success: bool,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

/// Bounded, oldest-first log of interactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMemory {
    interactions: Vec<Interaction>,
    max_interactions: usize,
}

impl Default for SessionMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INTERACTIONS)
    }
}

impl SessionMemory {
    pub fn new(max_interactions: usize) -> Self {
        Self {
            interactions: Vec::new(),
            max_interactions,
        }
    }

    pub fn max_interactions(&self) -> usize {
        self.max_interactions
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Append an interaction, evicting the oldest ones past capacity.
    pub fn add_interaction(
        &mut self,
        query: impl Into<String>,
        command: Option<String>,
        result_text: impl Into<String>,
        success: bool,
    ) {
        self.interactions.push(Interaction {
            query: query.into(),
            command,
            result_text: result_text.into(),
            success,
            timestamp: now_timestamp(),
        });
        self.enforce_capacity();
    }

    fn enforce_capacity(&mut self) {
        if self.interactions.len() > self.max_interactions {
            let excess = self.interactions.len() - self.max_interactions;
            self.interactions.drain(..excess);
        }
    }

    /// The last `count` interactions, oldest first.
    pub fn get_recent_interactions(&self, count: usize) -> &[Interaction] {
        let start = self.interactions.len().saturating_sub(count);
        &self.interactions[start..]
    }

    pub fn clear(&mut self) {
        self.interactions.clear();
    }

    /// Rebuild from a serialized value, re-capped to `max_interactions`.
    pub fn from_value(value: serde_json::Value, max_interactions: usize) -> Self {
        let mut memory: SessionMemory = serde_json::from_value(value)
            .unwrap_or_else(|_| SessionMemory::new(max_interactions));
        memory.max_interactions = max_interactions;
        memory.enforce_capacity();
        memory
    }

    /// Last few interactions as prompt text; empty when there are none.
    pub fn format_for_context(&self) -> String {
        if self.interactions.is_empty() {
            return String::new();
        }

        let mut lines = vec!["Recent session activity:".to_string()];
        for interaction in self.get_recent_interactions(CONTEXT_VIEW_ITEMS) {
            match &interaction.command {
                Some(command) => lines.push(format!(
                    "  - \"{}\" → {}",
                    interaction.query,
                    truncate_for_display(command)
                )),
                None => lines.push(format!("  - \"{}\" (answered)", interaction.query)),
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(memory: &mut SessionMemory, n: usize) {
        memory.add_interaction(format!("q{n}"), Some(format!("cmd{n}")), "", true);
    }

    #[test]
    fn test_keeps_last_in_order() {
        let mut memory = SessionMemory::new(3);
        for n in 0..5 {
            add(&mut memory, n);
        }
        let queries: Vec<_> = memory.interactions().iter().map(|i| i.query.as_str()).collect();
        assert_eq!(queries, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn test_recent_interactions() {
        let mut memory = SessionMemory::default();
        for n in 0..4 {
            add(&mut memory, n);
        }
        assert!(memory.get_recent_interactions(0).is_empty());
        assert_eq!(memory.get_recent_interactions(2)[0].query, "q2");
        assert_eq!(memory.get_recent_interactions(10).len(), 4);
    }

    #[test]
    fn test_clear() {
        let mut memory = SessionMemory::default();
        add(&mut memory, 1);
        memory.clear();
        assert!(memory.is_empty());
    }

    #[test]
    fn test_from_value_recaps() {
        let mut memory = SessionMemory::new(10);
        for n in 0..6 {
            add(&mut memory, n);
        }
        let value = serde_json::to_value(&memory).unwrap();
        assert_eq!(value["interactions"][0]["result"], "");

        let loaded = SessionMemory::from_value(value, 2);
        assert_eq!(loaded.max_interactions(), 2);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.interactions()[0].query, "q4");
    }

    #[test]
    fn test_from_value_garbage_is_empty() {
        let loaded = SessionMemory::from_value(serde_json::json!([1, 2]), 5);
        assert!(loaded.is_empty());
        assert_eq!(loaded.max_interactions(), 5);
    }

    #[test]
    fn test_format_shows_last_five() {
        let mut memory = SessionMemory::default();
        for n in 0..7 {
            add(&mut memory, n);
        }
        memory.add_interaction("what is ls", None, "lists files", true);
        let text = memory.format_for_context();
        assert!(text.starts_with("Recent session activity:"));
        assert!(!text.contains("q2"));
        assert!(text.contains("\"q3\" → cmd3"));
        assert!(text.contains("\"what is ls\" (answered)"));
        assert_eq!(text.lines().count(), 6);
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(SessionMemory::default().format_for_context(), "");
    }
}
