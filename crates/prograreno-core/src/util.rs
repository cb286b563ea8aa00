//! Utility functions shared by the prograreno crates

use crate::error::{ContainError, Result};
use std::path::{Component, Path, PathBuf};

/// Get current effective UID
pub fn get_uid() -> u32 {
    unsafe { libc::geteuid() }
}

/// Get current effective GID
pub fn get_gid() -> u32 {
    unsafe { libc::getegid() }
}

/// Check if running as root
pub fn is_root() -> bool {
    get_uid() == 0
}

/// Resolve `path` to an absolute, lexically normalized path.
///
/// Relative paths are joined onto the current directory. The path does not
/// have to exist; symlinks are not followed. `.` components are dropped and
/// `..` pops the previous component.
pub fn absolute_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(ContainError::InvalidConfig(
            "Path cannot be empty".to_string(),
        ));
    }

    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|e| {
            ContainError::InvalidConfig(format!(
                "Cannot resolve {}: current directory unavailable: {}",
                path.display(),
                e
            ))
        })?;
        cwd.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

/// Render an absolute path as the UTF-8 string the runtime document expects
pub fn path_to_string(path: &Path) -> Result<String> {
    path.to_str().map(str::to_string).ok_or_else(|| {
        ContainError::InvalidConfig(format!("Path is not valid UTF-8: {}", path.display()))
    })
}

/// Parse memory size string (e.g., "100M", "1G")
pub fn parse_memory_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('G') {
        (n, 1024u64 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1024u64 * 1024)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1024u64)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1u64)
    } else {
        (s.as_str(), 1u64)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| ContainError::InvalidConfig(format!("Invalid memory size: {}", s)))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| ContainError::InvalidConfig(format!("Memory size overflow: {}", s)))
}
