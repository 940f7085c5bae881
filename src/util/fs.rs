//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}

/// Write `content` to `path` only if it differs from the current content.
///
/// Returns true if the file was created or rewritten. Used by
/// canonicalization so that untouched configuration files keep their
/// timestamps.
pub fn update_file(path: &Path, content: &str) -> Result<bool> {
    if path.exists() {
        let existing = read_to_string(path)?;
        if existing == content {
            return Ok(false);
        }
    }
    write_string(path, content)?;
    Ok(true)
}

/// Modification time of a file, if it exists.
pub fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Copy `src` over `dst` when `dst` is missing or older than `src`.
///
/// Parent directories of `dst` are created as needed. Returns true if a
/// copy took place.
pub fn copy_if_stale(src: &Path, dst: &Path) -> Result<bool> {
    let stale = match (mtime(src), mtime(dst)) {
        (Some(s), Some(d)) => d < s,
        (_, None) => true,
        (None, _) => false,
    };
    if stale {
        if let Some(parent) = dst.parent() {
            ensure_dir(parent)?;
        }
        fs::copy(src, dst).with_context(|| {
            format!("failed to copy {} to {}", src.display(), dst.display())
        })?;
    }
    Ok(stale)
}

/// Make `path` absolute by prefixing `base` if it is relative.
pub fn make_absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_update_file_skips_identical_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("suite.conf");

        assert!(update_file(&path, "suite=demo\n").unwrap());
        assert!(!update_file(&path, "suite=demo\n").unwrap());
        assert!(update_file(&path, "suite=other\n").unwrap());
        assert_eq!(read_to_string(&path).unwrap(), "suite=other\n");
    }

    #[test]
    fn test_copy_if_stale() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("logo.png");
        let dst = tmp.path().join("bin").join("logo.png");
        fs::write(&src, b"image").unwrap();

        assert!(copy_if_stale(&src, &dst).unwrap());
        // Second call sees an up-to-date destination.
        assert!(!copy_if_stale(&src, &dst).unwrap());
    }

    #[test]
    fn test_make_absolute() {
        let base = Path::new("/suite");
        assert_eq!(
            make_absolute(Path::new("lib/a.jar"), base),
            PathBuf::from("/suite/lib/a.jar")
        );
        assert_eq!(
            make_absolute(Path::new("/opt/a.jar"), base),
            PathBuf::from("/opt/a.jar")
        );
    }
}
