//! Error types for local model operations.

use thiserror::Error;

/// Errors that can occur while serving a local model.
#[derive(Debug, Error)]
pub enum LocalAIError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request did not complete within its deadline.
    #[error("Request to llama-server timed out")]
    Timeout,

    /// Server returned an error response.
    #[error("API error: {0}")]
    Api(String),

    /// Server is not running or not reachable.
    #[error("llama-server not running at {0}")]
    ServerNotRunning(String),

    /// Server failed to start.
    #[error("Failed to start llama-server: {0}")]
    ServerStartFailed(String),

    /// Model file does not exist.
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// llama-server binary not found.
    #[error("llama-server binary not found (looked in {0} and on PATH)")]
    ServerBinaryNotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for server to start.
    #[error("Timeout waiting for llama-server to become ready")]
    ServerStartTimeout,
}
