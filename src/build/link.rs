//! Link stage: one linker invocation over the compiled object set.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::build::compile::CompiledObjects;
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::process::Cmd;

#[derive(Debug, Clone)]
pub struct Linker {
    pub program: String,
    pub flags: Vec<String>,
    pub script: PathBuf,
}

impl Linker {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            program: config.toolchain.linker.clone(),
            flags: config.toolchain.ldflags.clone(),
            script: config.path(&config.layout.linker_script),
        }
    }

    /// `<ld> <flags> -T <script> -o <image> <objects...>`
    pub fn command(&self, objects: &CompiledObjects, image: &Path) -> Cmd {
        let mut cmd = Cmd::new(self.program.clone())
            .args(&self.flags)
            .arg("-T")
            .arg_path(&self.script)
            .arg("-o")
            .arg_path(image);
        for object in objects.objects() {
            cmd = cmd.arg_path(object);
        }
        cmd.subject(image.display().to_string())
    }
}

/// Link `objects` into the kernel image at `image`.
///
/// Any previous image is removed first, so a failed link never leaves an
/// older kernel behind for packaging to pick up.
pub fn link_kernel(linker: &Linker, objects: &CompiledObjects, image: &Path) -> Result<()> {
    if let Some(parent) = image.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating boot directory '{}'", parent.display()))?;
    }
    if image.exists() {
        fs::remove_file(image)
            .with_context(|| format!("removing previous kernel image '{}'", image.display()))?;
    }

    log::info!("[kernel] LD {} ({} objects)", image.display(), objects.len());
    linker
        .command(objects, image)
        .error_msg("kernel link failed")
        .run_interactive()?;

    if !image.is_file() {
        return Err(BuildError::MissingInput {
            what: "linked kernel image",
            path: image.to_path_buf(),
        }
        .into());
    }
    Ok(())
}
