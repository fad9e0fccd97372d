//! Process manager for llama-server.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::LlamaCppClient;
use crate::error::LocalAIError;
use crate::paths::{bundled_server_path, find_llama_server};
use crate::{DEFAULT_CONTEXT_SIZE, DEFAULT_PORT};

/// Manager for the llama-server process serving one model file.
pub struct LlamaCppServer {
    port: u16,
    model_path: PathBuf,
    context_size: u32,
    process: Option<Child>,
}

impl LlamaCppServer {
    /// Create a new server manager with default settings.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            port: DEFAULT_PORT,
            model_path: model_path.into(),
            context_size: DEFAULT_CONTEXT_SIZE,
            process: None,
        }
    }

    /// Set a custom port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the context window size.
    pub fn with_context_size(mut self, context_size: u32) -> Self {
        self.context_size = context_size;
        self
    }

    /// Get the port this server is configured to use.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the model file this server serves.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Check if the server binary can be found.
    pub fn binary_exists(&self) -> bool {
        find_llama_server().is_some()
    }

    /// Check if the model file exists.
    pub fn model_exists(&self) -> bool {
        self.model_path.is_file()
    }

    /// Start the llama-server process.
    pub fn start(&mut self) -> Result<(), LocalAIError> {
        let server_path = find_llama_server().ok_or_else(|| {
            LocalAIError::ServerBinaryNotFound(
                bundled_server_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "~/.hai/bin".to_string()),
            )
        })?;

        if !self.model_exists() {
            return Err(LocalAIError::ModelNotFound(
                self.model_path.display().to_string(),
            ));
        }

        info!(
            "Starting llama-server on port {} with model {}",
            self.port,
            self.model_path.display()
        );

        let child = Command::new(&server_path)
            .arg("--model")
            .arg(&self.model_path)
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(self.port.to_string())
            .arg("--ctx-size")
            .arg(self.context_size.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LocalAIError::ServerStartFailed(e.to_string()))?;

        debug!("llama-server process started with PID: {}", child.id());
        self.process = Some(child);

        Ok(())
    }

    /// Wait for the server to become ready.
    pub async fn wait_ready(&mut self, timeout: Duration) -> Result<(), LocalAIError> {
        let client = LlamaCppClient::with_port(self.port);
        let start = std::time::Instant::now();
        let check_interval = Duration::from_millis(500);

        info!("Waiting for llama-server to become ready...");

        while start.elapsed() < timeout {
            if client.check_health().await.is_ok() {
                info!("llama-server is ready");
                return Ok(());
            }
            if !self.is_running() {
                return Err(LocalAIError::ServerStartFailed(
                    "process exited before becoming ready".to_string(),
                ));
            }
            sleep(check_interval).await;
        }

        Err(LocalAIError::ServerStartTimeout)
    }

    /// Stop the server process.
    pub fn stop(&mut self) -> Result<(), LocalAIError> {
        if let Some(mut child) = self.process.take() {
            info!("Stopping llama-server (PID: {})", child.id());

            // Try graceful shutdown first
            #[cfg(unix)]
            {
                unsafe {
                    libc::kill(child.id() as i32, libc::SIGTERM);
                }
                std::thread::sleep(Duration::from_millis(500));
            }

            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Server exited with status: {:?}", status);
                }
                Ok(None) => {
                    warn!("Server didn't exit gracefully, killing...");
                    let _ = child.kill();
                    let _ = child.wait();
                }
                Err(e) => {
                    warn!("Error checking server status: {}", e);
                    let _ = child.kill();
                }
            }
        }
        Ok(())
    }

    /// Check if the server process is running.
    pub fn is_running(&mut self) -> bool {
        if let Some(ref mut child) = self.process {
            match child.try_wait() {
                Ok(Some(_)) => {
                    self.process = None;
                    false
                }
                Ok(None) => true,
                Err(_) => false,
            }
        } else {
            false
        }
    }

    /// Get a client connected to this server.
    pub fn client(&self) -> LlamaCppClient {
        LlamaCppClient::with_port(self.port)
    }
}

impl Drop for LlamaCppServer {
    fn drop(&mut self) {
        if self.process.is_some() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config() {
        let server = LlamaCppServer::new("/models/test.gguf")
            .with_port(9999)
            .with_context_size(8192);
        assert_eq!(server.port(), 9999);
        assert_eq!(server.context_size, 8192);
        assert_eq!(server.model_path(), Path::new("/models/test.gguf"));
    }

    #[test]
    fn test_model_exists_checks_file() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("tiny.gguf");
        assert!(!LlamaCppServer::new(&model).model_exists());

        std::fs::write(&model, b"GGUF").unwrap();
        assert!(LlamaCppServer::new(&model).model_exists());
    }

    #[test]
    fn test_not_running_before_start() {
        let mut server = LlamaCppServer::new("/models/test.gguf");
        assert!(!server.is_running());
    }
}
