//! Staging directory helpers.
//!
//! A staging directory belongs to exactly one stage, which wipes and
//! recreates it before writing, so nothing from an earlier (possibly
//! interrupted) run survives into the next artifact.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Delete `dir` with everything in it and recreate it empty.
///
/// Tolerates a missing directory and partial leftovers from a killed run.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() || dir.is_symlink() {
        let meta = fs::symlink_metadata(dir)
            .with_context(|| format!("inspecting staging path '{}'", dir.display()))?;
        if meta.is_dir() {
            fs::remove_dir_all(dir)
                .with_context(|| format!("removing staging directory '{}'", dir.display()))?;
        } else {
            fs::remove_file(dir)
                .with_context(|| format!("removing stale staging path '{}'", dir.display()))?;
        }
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("creating staging directory '{}'", dir.display()))?;
    Ok(())
}

/// Recursively copy `src` into `dst`, preserving symlinks rather than
/// following them.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        bail!("copy source '{}' is not a directory", src.display());
    }
    fs::create_dir_all(dst)
        .with_context(|| format!("creating directory '{}'", dst.display()))?;

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking '{}'", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("relativizing '{}'", entry.path().display()))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("creating directory '{}'", target.display()))?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "copying '{}' -> '{}'",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }
    Ok(())
}

/// Replace `dst` with a fresh copy of `src` (delete, then copy).
pub fn replace_dir_with_copy(src: &Path, dst: &Path) -> Result<()> {
    reset_dir(dst)?;
    copy_dir_recursive(src, dst)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target =
        fs::read_link(src).with_context(|| format!("reading symlink '{}'", src.display()))?;
    std::os::unix::fs::symlink(&target, dst)
        .with_context(|| format!("creating symlink '{}'", dst.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst).with_context(|| format!("copying '{}'", src.display()))?;
    Ok(())
}
