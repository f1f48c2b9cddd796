//! Utility functions and helpers

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path by removing `.` and resolving `..` components
///
/// Does not touch the filesystem, so symlinks must already be resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => {
                // Never pop past the root or a prefix
                if !matches!(
                    normalized.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    normalized
}

/// Get a display path for `to`, relative to `from` when possible
pub fn display_relative(from: &Path, to: &Path) -> String {
    pathdiff::diff_paths(to, from)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| to.to_path_buf())
        .display()
        .to_string()
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 60.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = secs - (mins as f64 * 60.0);
        format!("{}m {:.2}s", mins, remaining_secs)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}
