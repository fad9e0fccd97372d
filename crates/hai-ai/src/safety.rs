//! Advisory command safety checks.
//!
//! A flagged command still reaches the user; the reason is attached to the
//! response as a warning and execution gating is left to the caller.

use thiserror::Error;

/// Why a command was flagged. The message is user-facing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct UnsafeCommand {
    pub reason: String,
}

impl UnsafeCommand {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Lowercase substring markers and the operation each one names.
const DANGEROUS_OPERATIONS: &[(&str, &str)] = &[
    ("rm ", "rm"),
    ("rmdir ", "rmdir"),
    ("mkfs", "mkfs"),
    ("dd ", "dd"),
    ("fdisk", "fdisk"),
    ("chmod 777", "overly permissive chmod"),
    ("chmod -r", "recursive chmod"),
    ("chown -r", "recursive chown"),
    ("kill -9 1", "killing init process"),
    ("pkill -9", "force killing processes"),
    ("reboot", "reboot"),
    ("shutdown", "shutdown"),
    ("halt", "halt"),
    ("poweroff", "poweroff"),
    ("passwd", "passwd"),
    ("useradd", "useradd"),
    ("userdel", "userdel"),
    ("groupadd", "groupadd"),
    ("systemctl", "systemctl"),
];

const PROTECTED_PATHS: &[&str] = &["/etc/", "/sys/", "/boot/", "/dev/", "/proc/"];

/// Markers that turn a protected-path reference into a write.
const WRITE_INDICATORS: &[&str] = &[">", "tee ", "mv ", "cp ", "truncate ", "shred ", "unlink "];

/// Classify `command`. The first matching rule supplies the reason.
pub fn validate_command(command: &str) -> Result<(), UnsafeCommand> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(UnsafeCommand::new("Command is empty"));
    }

    let lower = trimmed.to_lowercase();

    if let Some((_, name)) = DANGEROUS_OPERATIONS
        .iter()
        .find(|(marker, _)| lower.contains(marker))
    {
        return Err(UnsafeCommand::new(format!(
            "Command contains dangerous operation: {}",
            name
        )));
    }

    if let Some(path) = PROTECTED_PATHS.iter().find(|path| lower.contains(*path)) {
        if WRITE_INDICATORS.iter().any(|w| lower.contains(w)) {
            return Err(UnsafeCommand::new(format!(
                "Command writes to system path: {}",
                path
            )));
        }
    }

    Ok(())
}

/// `validate_command` as an optional warning string.
pub fn safety_warning(command: &str) -> Option<String> {
    validate_command(command).err().map(|e| e.reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_commands() {
        for cmd in ["ls -la", "pwd", "git status", "cat /etc/hosts", "du -sh *"] {
            assert_eq!(validate_command(cmd), Ok(()), "{cmd}");
        }
    }

    #[test]
    fn test_rm_flagged() {
        let err = validate_command("rm -rf /").unwrap_err();
        assert_eq!(err.reason, "Command contains dangerous operation: rm");
    }

    #[test]
    fn test_case_insensitive() {
        assert!(validate_command("SHUTDOWN now").is_err());
        assert!(validate_command("Chmod -R 755 /var").is_err());
    }

    #[test]
    fn test_protected_path_requires_write() {
        assert!(validate_command("ls /proc/").is_ok());
        let err = validate_command("echo 1 > /proc/sys/vm/drop_caches").unwrap_err();
        assert_eq!(err.reason, "Command writes to system path: /proc/");
        assert!(validate_command("echo x | tee /etc/motd").is_err());
    }

    #[test]
    fn test_first_rule_wins() {
        let err = validate_command("rm /etc/passwd").unwrap_err();
        assert_eq!(err.reason, "Command contains dangerous operation: rm");
    }

    #[test]
    fn test_empty_is_unsafe() {
        assert!(validate_command("   ").is_err());
    }

    #[test]
    fn test_safety_warning() {
        assert_eq!(safety_warning("ls"), None);
        assert!(safety_warning("sudo reboot").unwrap().contains("reboot"));
    }
}
