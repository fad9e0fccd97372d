//! # hai context
//!
//! Collects what the model should know about the user's surroundings and
//! fits it into a token budget:
//!
//! ```text
//!   cwd ─┐
//!   git ─┤
//!  hist ─┼─▶ sections ─▶ relevance filter ─▶ budget ─▶ PromptContext
//!   env ─┤
//! files ─┤
//! memory ┘
//! ```
//!
//! Every collector is best effort. A collector that fails contributes no
//! section; it never fails the request.

pub mod config;
pub mod cwd;
pub mod env;
pub mod files;
pub mod git;
pub mod history;
pub mod relevance;

mod assembler;

pub use assembler::ContextAssembler;
pub use config::ContextSettings;
pub use git::{GitError, GitProbe, GitState};
pub use relevance::{budget_context, calculate_relevance, estimate_tokens, filter_by_relevance};
