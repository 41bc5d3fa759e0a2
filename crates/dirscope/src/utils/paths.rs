use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// Resolves user input to an absolute path: `~` expands to `HOME`, relative
/// paths are joined onto `base`.
pub fn normalize_path(raw: &str, base: &Path) -> CoreResult<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput("path must not be empty".to_string()));
    }

    let candidate = if trimmed == "~" || trimmed.starts_with("~/") || trimmed.starts_with("~\\") {
        expand_home(trimmed)?
    } else {
        PathBuf::from(trimmed)
    };

    if candidate.is_absolute() {
        Ok(candidate)
    } else {
        Ok(base.join(candidate))
    }
}

/// Lexical identity of a path for cache and coalescing keys: trailing
/// separators and `.` components are dropped, nothing touches the disk.
pub fn path_key(path: &Path) -> PathBuf {
    path.components().collect()
}

pub fn expand_home(raw: &str) -> CoreResult<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .map_err(|_| CoreError::Internal("HOME is not set".to_string()))?;
    if raw == "~" {
        return Ok(home);
    }
    let rest = raw
        .strip_prefix("~/")
        .or_else(|| raw.strip_prefix("~\\"))
        .unwrap_or_default();
    Ok(home.join(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_base() {
        let base = Path::new("/data");
        assert_eq!(
            normalize_path("music", base).expect("path"),
            PathBuf::from("/data/music")
        );
        assert_eq!(
            normalize_path(" /abs/dir ", base).expect("path"),
            PathBuf::from("/abs/dir")
        );
    }

    #[test]
    fn path_keys_ignore_trailing_separators() {
        assert_eq!(path_key(Path::new("/a/b/")), PathBuf::from("/a/b"));
        assert_eq!(path_key(Path::new("/a/./b")), PathBuf::from("/a/b"));
        assert_eq!(
            path_key(Path::new("/a/b/")).to_string_lossy(),
            path_key(Path::new("/a/b")).to_string_lossy()
        );
        assert_eq!(path_key(Path::new("/a/../b")), PathBuf::from("/a/../b"));
    }

    #[test]
    fn empty_path_is_rejected() {
        let err = normalize_path("   ", Path::new("/")).expect_err("empty");
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }
}
