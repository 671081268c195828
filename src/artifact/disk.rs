//! Persistent hard disk image for the emulator.
//!
//! The image lives outside every staging directory and is created once, as
//! a raw file of fixed size. An existing file is reused as-is: it carries
//! whatever the guest wrote to it, so it is never checked or rewritten.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::process::Cmd;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskState {
    Created,
    Reused,
}

/// Raw disk image settings.
#[derive(Debug, Clone)]
pub struct DiskImage {
    pub path: PathBuf,
    pub size_mib: u64,
    /// Image creation utility, invoked as `<tool> create -f raw <path> <N>M`.
    pub tool: String,
}

impl DiskImage {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            path: config.path(&config.layout.disk_image),
            size_mib: config.emulator.disk_size_mib,
            tool: config.emulator.disk_tool.clone(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_mib * MIB
    }

    pub fn create_command(&self) -> Cmd {
        Cmd::new(self.tool.clone())
            .args(["create", "-f", "raw"])
            .arg_path(&self.path)
            .arg(format!("{}M", self.size_mib))
            .subject(self.path.display().to_string())
    }

    /// Create the image if it does not exist yet.
    pub fn ensure(&self) -> Result<DiskState> {
        if self.path.exists() {
            log::info!("[run] reusing disk image {}", self.path.display());
            return Ok(DiskState::Reused);
        }
        if let Some(parent) = non_empty_parent(&self.path) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory '{}'", parent.display()))?;
        }

        log::info!(
            "[run] creating {} MiB raw disk image {}",
            self.size_mib,
            self.path.display()
        );
        self.create_command()
            .error_msg("disk image creation failed. Install qemu-img.")
            .run()?;

        if !self.path.is_file() {
            return Err(BuildError::MissingInput {
                what: "created disk image",
                path: self.path.clone(),
            }
            .into());
        }
        Ok(DiskState::Created)
    }
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}
