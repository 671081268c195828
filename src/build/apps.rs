//! Apps delegate: runs the user-space sub-build and stages its output.
//!
//! The sub-build is opaque. Its only contract is that on success the apps
//! output directory holds the binaries to ship. That directory replaces the
//! apps subtree of the initrd staging root wholesale.

use anyhow::{Context, Result};
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::artifact::filesystem::replace_dir_with_copy;
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::process::Cmd;

/// Run the apps sub-build inside the apps project directory.
pub fn run_apps_build(config: &BuildConfig) -> Result<()> {
    let apps_dir = config.path(&config.layout.apps_dir);
    if !apps_dir.is_dir() {
        return Err(BuildError::MissingInput {
            what: "apps sub-project",
            path: apps_dir,
        }
        .into());
    }

    log::info!(
        "[apps] running '{}' in {}",
        config.toolchain.apps_build.join(" "),
        apps_dir.display()
    );
    Cmd::from_argv(&config.toolchain.apps_build)?
        .current_dir(&apps_dir)
        .subject(apps_dir.display().to_string())
        .error_msg("apps sub-build failed")
        .run_interactive()
}

/// Replace the initrd apps subtree with the sub-build's output.
///
/// Returns the staged directory.
pub fn stage_apps(config: &BuildConfig) -> Result<PathBuf> {
    let output = config.path(&config.layout.apps_output);
    if !output.is_dir() {
        return Err(BuildError::MissingInput {
            what: "apps build output",
            path: output,
        }
        .into());
    }

    let staged = config.initrd_apps_dir();
    replace_dir_with_copy(&output, &staged)
        .with_context(|| format!("staging apps into '{}'", staged.display()))?;

    let files = WalkDir::new(&staged)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
        .count();
    log::info!("[apps] staged {} file(s) into {}", files, staged.display());
    Ok(staged)
}

/// Sub-build followed by staging; a failed sub-build leaves the initrd
/// staging root untouched.
pub fn build_apps(config: &BuildConfig) -> Result<PathBuf> {
    run_apps_build(config)?;
    stage_apps(config)
}
