//! Path helpers for resolving OSW path fields against base directories.

use std::fs;
use std::path::{Path, PathBuf};

/// Fallback directories appended to the configured file search paths
pub const DEFAULT_FILE_PATHS: [&str; 5] = [
    "./files",
    "./weather",
    "../../files",
    "../../weather",
    "./",
];

/// Fallback directories appended to the configured measure search paths
pub const DEFAULT_MEASURE_PATHS: [&str; 3] = ["./measures", "../../measures", "./"];

/// Join `p` onto `base` when relative, then canonicalize if the result exists.
///
/// A path that does not exist is returned absolute but unnormalized.
pub fn canonical_or_absolute(p: &Path, base: &Path) -> PathBuf {
    let result = if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    };

    if result.exists() {
        fs::canonicalize(&result).unwrap_or(result)
    } else {
        result
    }
}

/// Drop one trailing separator, keeping a bare root intact
pub fn remove_trailing_separator(p: &str) -> PathBuf {
    let trimmed = if p.len() > 1 && (p.ends_with('/') || p.ends_with('\\')) {
        &p[..p.len() - 1]
    } else {
        p
    };
    PathBuf::from(trimmed)
}

/// Strip a `file://` or `file:` URL prefix
pub fn strip_file_url(p: &str) -> Option<&str> {
    p.strip_prefix("file://").or_else(|| p.strip_prefix("file:"))
}

/// Process working directory, `.` if it cannot be read
pub fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
