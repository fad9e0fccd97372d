//! Running generated commands.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

/// How a command run ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed or did not finish.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Stopped by the user with Ctrl-C.
    pub interrupted: bool,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && !self.interrupted && self.exit_code == Some(0)
    }

    /// Short description stored in memory.
    pub fn result_text(&self) -> String {
        if self.interrupted {
            return "interrupted".to_string();
        }
        if self.timed_out {
            return "timed out".to_string();
        }
        let output = if self.stdout.trim().is_empty() {
            self.stderr.trim()
        } else {
            self.stdout.trim()
        };
        let first_line = output.lines().next().unwrap_or_default();
        match self.exit_code {
            Some(0) => first_line.to_string(),
            Some(code) if first_line.is_empty() => format!("exit code {}", code),
            Some(code) => format!("exit code {}: {}", code, first_line),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Run `command` with `sh -c`, giving up after `timeout`.
///
/// Ctrl-C while the command runs kills it and yields an interrupted outcome
/// instead of ending hai.
pub async fn execute(command: &str, timeout: Duration) -> io::Result<ExecutionOutcome> {
    debug!(command, ?timeout, "executing");

    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    tokio::select! {
        result = tokio::time::timeout(timeout, child.wait_with_output()) => match result {
            Ok(output) => {
                let output = output?;
                Ok(ExecutionOutcome {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code(),
                    ..ExecutionOutcome::default()
                })
            }
            Err(_) => {
                warn!("command timed out after {:?}", timeout);
                Ok(ExecutionOutcome {
                    timed_out: true,
                    ..ExecutionOutcome::default()
                })
            }
        },
        _ = tokio::signal::ctrl_c() => {
            debug!("command interrupted");
            Ok(ExecutionOutcome {
                interrupted: true,
                ..ExecutionOutcome::default()
            })
        }
    }
}
