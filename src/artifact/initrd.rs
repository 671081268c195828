//! Initrd packaging.
//!
//! The boot loader loads `initrd.tar`, an uncompressed tar of the initrd
//! staging root. Entries are named relative to that root (`apps/shell`,
//! `etc/motd`, ...), directories are included, symlinks are stored as
//! symlinks, and header metadata is normalized so unchanged input produces
//! an identical archive.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tar::{Builder, HeaderMode};
use walkdir::WalkDir;

use crate::error::BuildError;

/// Archive everything under `staging_root` into `archive`.
///
/// The archive is written beside its destination and renamed into place, so
/// an interrupted run never leaves a truncated `initrd.tar` in the boot
/// directory. Returns the number of entries written.
pub fn package_initrd(staging_root: &Path, archive: &Path) -> Result<usize> {
    if !staging_root.is_dir() {
        return Err(BuildError::MissingInput {
            what: "initrd staging root",
            path: staging_root.to_path_buf(),
        }
        .into());
    }
    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating boot directory '{}'", parent.display()))?;
    }

    let partial = archive.with_extension("tar.partial");
    let file = File::create(&partial)
        .with_context(|| format!("creating initrd archive '{}'", partial.display()))?;
    let mut builder = Builder::new(file);
    builder.mode(HeaderMode::Deterministic);
    builder.follow_symlinks(false);

    let mut entries = 0;
    for entry in WalkDir::new(staging_root).min_depth(1).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("walking initrd root '{}'", staging_root.display()))?;
        let name = entry
            .path()
            .strip_prefix(staging_root)
            .with_context(|| format!("relativizing '{}'", entry.path().display()))?;

        let appended = if entry.file_type().is_dir() {
            builder.append_dir(name, entry.path())
        } else {
            builder.append_path_with_name(entry.path(), name)
        };
        appended.with_context(|| format!("adding '{}' to initrd", name.display()))?;
        entries += 1;
    }

    let mut file = builder
        .into_inner()
        .with_context(|| format!("finishing initrd archive '{}'", partial.display()))?;
    file.flush()?;
    file.sync_all()?;
    drop(file);

    fs::rename(&partial, archive).with_context(|| {
        format!(
            "moving initrd archive '{}' -> '{}'",
            partial.display(),
            archive.display()
        )
    })?;

    log::info!("[apps] packaged {} entries into {}", entries, archive.display());
    Ok(entries)
}
