//! Bootable ISO image builder.
//!
//! Masters the ISO root (which holds `boot/kernel.elf`, `boot/initrd.tar`
//! and the GRUB configuration) with `grub-mkrescue`. Hosts without a POSIX
//! userland reach the tool through a wrapper environment (`ubuntu run` by
//! default), so the tool is always run from the project root with
//! root-relative paths that mean the same thing on both sides.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::process::Cmd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Posix,
    Other,
}

impl HostPlatform {
    pub fn current() -> Self {
        if cfg!(unix) {
            HostPlatform::Posix
        } else {
            HostPlatform::Other
        }
    }
}

/// The program that has to be on `PATH` to master an ISO on `platform`.
pub fn iso_program(config: &BuildConfig, platform: HostPlatform) -> &str {
    match (platform, config.iso.wrapper.first()) {
        (HostPlatform::Other, Some(wrapper)) => wrapper,
        _ => &config.iso.tool,
    }
}

/// `[wrapper...] grub-mkrescue -o <iso> <iso_root> -V <label>`
pub fn iso_command(config: &BuildConfig, platform: HostPlatform) -> Result<Cmd> {
    let mut argv = Vec::new();
    if platform == HostPlatform::Other {
        argv.extend(config.iso.wrapper.iter().cloned());
    }
    argv.push(config.iso.tool.clone());

    Ok(Cmd::from_argv(&argv)?
        .arg("-o")
        .arg_path(&config.layout.iso_image)
        .arg_path(&config.layout.iso_root)
        .args(["-V", &config.iso.volume_label])
        .current_dir(config.root())
        .subject(config.layout.iso_image.display().to_string()))
}

/// Master the ISO image, replacing any previous one.
///
/// Both boot directory members must already exist.
pub fn build_iso(config: &BuildConfig, platform: HostPlatform) -> Result<PathBuf> {
    for (what, path) in [
        ("kernel image", &config.layout.kernel_image),
        ("initrd archive", &config.layout.initrd_archive),
    ] {
        let path = config.path(path);
        if !path.is_file() {
            return Err(BuildError::MissingInput { what, path }.into());
        }
    }

    let iso = config.path(&config.layout.iso_image);
    remove_previous(&iso)?;

    log::info!(
        "[iso] mastering {} (label {})",
        iso.display(),
        config.iso.volume_label
    );
    iso_command(config, platform)?
        .error_msg("ISO mastering failed. Install grub2 (grub-mkrescue) and xorriso.")
        .run_interactive()?;

    if !iso.is_file() {
        return Err(BuildError::MissingInput {
            what: "mastered ISO image",
            path: iso,
        }
        .into());
    }
    Ok(iso)
}

fn remove_previous(iso: &Path) -> Result<()> {
    if iso.exists() {
        fs::remove_file(iso)
            .with_context(|| format!("removing previous ISO '{}'", iso.display()))?;
    }
    Ok(())
}
