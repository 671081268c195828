//! Preflight checks for build validation.
//!
//! Validates that the host has the tools a stage is about to invoke, so a
//! missing `grub-mkrescue` is reported as such instead of as a cryptic
//! spawn failure halfway through the pipeline.
//!
//! # Example
//!
//! ```rust
//! use synapse_builder::preflight::{check_required_tools, command_exists};
//!
//! if !command_exists("qemu-system-i386") {
//!     println!("qemu not installed");
//! }
//!
//! let tools = [("clang", "clang"), ("ld.lld", "lld")];
//! if let Err(e) = check_required_tools(&tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Result};

use crate::artifact::iso::{iso_program, HostPlatform};
use crate::config::BuildConfig;
use crate::stages::Stage;

/// Check if a command exists on the host system.
///
/// Bare names are looked up in `PATH`; paths are checked directly.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Check that specific tools are available.
///
/// Each tuple is (command, package that provides it). On failure the error
/// lists every missing tool, one per line.
pub fn check_required_tools<C: AsRef<str>>(tools: &[(C, &str)]) -> Result<()> {
    let missing: Vec<String> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool.as_ref()))
        .map(|(tool, package)| format!("  {} (install: {})", tool.as_ref(), package))
        .collect();

    if !missing.is_empty() {
        bail!("Missing required host tools:\n{}", missing.join("\n"));
    }
    Ok(())
}

/// Tools `stage` invokes under `config`, with the package that provides each.
pub fn tools_for_stage(
    config: &BuildConfig,
    stage: Stage,
    platform: HostPlatform,
) -> Vec<(String, &'static str)> {
    match stage {
        Stage::Kernel => vec![
            (config.toolchain.cc.clone(), "clang"),
            (config.toolchain.linker.clone(), "lld"),
        ],
        Stage::Apps => config
            .toolchain
            .apps_build
            .first()
            .map(|program| vec![(program.clone(), "apps sub-build runtime")])
            .unwrap_or_default(),
        Stage::Iso => {
            let package = match platform {
                HostPlatform::Posix => "grub2 + xorriso",
                HostPlatform::Other => "wrapper environment with grub2 + xorriso",
            };
            vec![(iso_program(config, platform).to_string(), package)]
        }
        Stage::Run | Stage::RunDebug => {
            let mut tools = Vec::new();
            // an existing disk image is reused without the disk tool
            if !config.path(&config.layout.disk_image).exists() {
                tools.push((config.emulator.disk_tool.clone(), "qemu-utils"));
            }
            tools.push((config.emulator.binary.clone(), "qemu-system-x86"));
            tools
        }
    }
}

/// Check the tools of one stage.
pub fn check_stage_tools(config: &BuildConfig, stage: Stage, platform: HostPlatform) -> Result<()> {
    check_required_tools(&tools_for_stage(config, stage, platform))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn test_command_exists() {
        // 'sh' should exist on any Unix system
        assert!(command_exists("sh"));
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[cfg(unix)]
    #[test]
    fn test_check_required_tools_success() {
        let tools = [("sh", "dash"), ("cat", "coreutils")];
        assert!(check_required_tools(&tools).is_ok());
    }

    #[test]
    fn test_check_required_tools_lists_every_missing_tool() {
        let tools = [
            ("nonexistent_command_xyz", "fake-package"),
            ("nonexistent_command_abc", "other-package"),
        ];
        let err = check_required_tools(&tools).unwrap_err().to_string();
        assert!(err.contains("nonexistent_command_xyz (install: fake-package)"));
        assert!(err.contains("nonexistent_command_abc (install: other-package)"));
    }

    #[test]
    fn test_tools_for_stage() {
        let config = BuildConfig::with_defaults(Path::new("/proj"));

        let kernel: Vec<_> = tools_for_stage(&config, Stage::Kernel, HostPlatform::Posix)
            .into_iter()
            .map(|(tool, _)| tool)
            .collect();
        assert_eq!(kernel, vec!["clang", "ld.lld"]);

        let iso = tools_for_stage(&config, Stage::Iso, HostPlatform::Other);
        assert_eq!(iso[0].0, "ubuntu");

        let run = tools_for_stage(&config, Stage::RunDebug, HostPlatform::Posix);
        assert_eq!(run[0].0, "qemu-img");
        assert_eq!(run[1].0, "qemu-system-i386");

        let apps = tools_for_stage(&config, Stage::Apps, HostPlatform::Posix);
        assert_eq!(apps[0].0, "python3");
    }

    #[test]
    fn test_existing_disk_image_drops_disk_tool() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("ata.vhd"), "disk").unwrap();
        let config = BuildConfig::with_defaults(temp.path());

        let run: Vec<_> = tools_for_stage(&config, Stage::Run, HostPlatform::Posix)
            .into_iter()
            .map(|(tool, _)| tool)
            .collect();

        assert_eq!(run, vec!["qemu-system-i386"]);
    }
}
