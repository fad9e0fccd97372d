//! Local model backend for hai using llama.cpp.
//!
//! A local model file is served by a `llama-server` process that hai starts
//! on demand and talks to over its OpenAI-compatible HTTP API.

mod client;
mod error;
pub mod paths;
mod server;

pub use client::{CompletionOptions, LlamaCppClient};
pub use error::LocalAIError;
pub use server::LlamaCppServer;

/// Default port for the local llama-server instance.
pub const DEFAULT_PORT: u16 = 11435;

/// Default context window passed to llama-server.
pub const DEFAULT_CONTEXT_SIZE: u32 = 4096;
