//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;
use serde::de::DeserializeOwned;
use serde::Serialize;
use walkdir::WalkDir;

/// Recursively copy a directory, skipping entries whose name matches
/// `excluded_names` or whose source-relative path matches one of `excluded_globs`.
///
/// Excluded directories are not descended into. Symlinks are followed and
/// their targets copied as regular files and directories, so the copy stands
/// on its own wherever it is moved; a dangling or looping link is an error.
pub fn copy_dir_filtered(
    src: &Path,
    dst: &Path,
    excluded_names: &[&str],
    excluded_globs: &[Pattern],
) -> Result<u64> {
    fs::create_dir_all(dst)
        .with_context(|| format!("failed to create directory: {}", dst.display()))?;

    let mut copied = 0;
    let walker = WalkDir::new(src)
        .follow_links(true)
        .min_depth(1)
        .into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        if excluded_names.iter().any(|n| *n == name) {
            return false;
        }
        let rel = relative_path(src, entry.path());
        !excluded_globs.iter().any(|p| p.matches_path(&rel))
    });

    for entry in walker {
        let entry = entry.with_context(|| format!("failed to read directory: {}", src.display()))?;
        let rel = relative_path(src, entry.path());
        let dst_path = dst.join(&rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dst_path)
                .with_context(|| format!("failed to create directory: {}", dst_path.display()))?;
        } else {
            fs::copy(entry.path(), &dst_path).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    entry.path().display(),
                    dst_path.display()
                )
            })?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Move a directory, replacing anything already at `dst`.
///
/// Falls back to copy + remove when a plain rename is not possible
/// (for example across filesystems).
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    remove_dir_all_if_exists(dst)?;
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }

    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    tracing::debug!("rename failed, copying {} to {}", src.display(), dst.display());
    copy_dir_filtered(src, dst, &[], &[])?;
    fs::remove_dir_all(src)
        .with_context(|| format!("failed to remove directory: {}", src.display()))
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}

/// Read and deserialize a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = read_to_string(path)?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse JSON: {}", path.display()))
}

/// Serialize a value as pretty JSON (two-space indent, trailing newline).
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut contents = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize JSON for {}", path.display()))?;
    contents.push('\n');
    write_string(path, &contents)
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Compile exclusion globs, reporting the first invalid one.
pub fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("invalid glob pattern: {}", p)))
        .collect()
}
