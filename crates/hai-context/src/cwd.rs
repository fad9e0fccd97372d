//! Working directory metadata.

use std::fs;
use std::path::{Path, PathBuf};

/// What the process can do in its working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CwdInfo {
    pub path: PathBuf,
    pub exists: bool,
    pub readable: bool,
    pub writable: bool,
    /// Directory entries, when the directory could be listed.
    pub entry_count: Option<usize>,
}

impl CwdInfo {
    pub fn collect(path: &Path) -> Self {
        let exists = path.is_dir();
        let entry_count = fs::read_dir(path).ok().map(|entries| entries.count());
        Self {
            path: path.to_path_buf(),
            exists,
            readable: exists && entry_count.is_some(),
            writable: exists && is_writable(path),
            entry_count,
        }
    }

    pub fn format(&self) -> String {
        let mut lines = vec![format!("Current directory: {}", self.path.display())];
        if !self.exists {
            lines.push("Status: missing".to_string());
            return lines.join("\n");
        }

        let mut access = Vec::new();
        if self.readable {
            access.push("readable");
        }
        if self.writable {
            access.push("writable");
        }
        if access.is_empty() {
            access.push("no access");
        }
        lines.push(format!("Status: {}", access.join(", ")));
        if let Some(count) = self.entry_count {
            lines.push(format!("Items: {}", count));
        }
        lines.join("\n")
    }
}

#[cfg(unix)]
fn is_writable(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn is_writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| !meta.permissions().readonly())
        .unwrap_or(false)
}
