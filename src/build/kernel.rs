//! Kernel pipeline: discover -> compile -> link.
//!
//! # Usage
//!
//! ```rust,ignore
//! use synapse_builder::build::kernel::build_kernel;
//! use synapse_builder::BuildConfig;
//!
//! let config = BuildConfig::load(&root, None)?;
//! let kernel = build_kernel(&config)?;
//! println!("kernel at {}", kernel.image.display());
//! ```

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::build::compile::{compile_units, Compiler};
use crate::build::discovery::discover_sources;
use crate::build::link::{link_kernel, Linker};
use crate::config::BuildConfig;

/// Result of a successful kernel build.
#[derive(Debug, Clone)]
pub struct KernelBuild {
    pub image: PathBuf,
    pub objects: usize,
}

/// Build the kernel image.
///
/// The link only runs when every unit compiled; a compile failure returns
/// before the linker is invoked.
pub fn build_kernel(config: &BuildConfig) -> Result<KernelBuild> {
    let source_root = config.path(&config.layout.kernel_src);
    let staging = config.path(&config.layout.kernel_objects);
    let image = config.path(&config.layout.kernel_image);

    let units = discover_sources(&source_root, &staging)?;
    if units.is_empty() {
        bail!(
            "no .c or .s sources found under {}",
            source_root.display()
        );
    }

    let objects = compile_units(&Compiler::from_config(config), &units, &staging, config.jobs())
        .context("compiling kernel sources")?;
    link_kernel(&Linker::from_config(config), &objects, &image)
        .context("linking kernel image")?;

    Ok(KernelBuild {
        image,
        objects: objects.len(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::CompileFailures;
    use crate::test_support::{fake_tool, FAKE_CC, FAKE_LD};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Project with fake tools; the linker also drops a marker when it runs.
    fn project(sources: &[(&str, &str)]) -> (TempDir, BuildConfig) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        for (rel, body) in sources {
            let path = root.join("kernel").join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        let linker_script = format!(
            "#!/bin/sh\ntouch '{}'\n{}",
            root.join("linked").display(),
            FAKE_LD.trim_start_matches("#!/bin/sh\n")
        );

        let mut config = BuildConfig::with_defaults(root);
        config.toolchain.cc = fake_tool(root, "cc", FAKE_CC).display().to_string();
        config.toolchain.linker = fake_tool(root, "ld", &linker_script).display().to_string();
        config.toolchain.jobs = Some(2);
        (temp, config)
    }

    #[test]
    fn test_builds_image() {
        let (temp, config) = project(&[("kernel.c", "k"), ("arch/x86/boot.s", "b")]);

        let kernel = build_kernel(&config).unwrap();

        assert_eq!(kernel.objects, 2);
        assert_eq!(kernel.image, temp.path().join("isodir/boot/kernel.elf"));
        assert_eq!(fs::read_to_string(&kernel.image).unwrap(), "OBJ:kOBJ:b");
    }

    #[test]
    fn test_compile_failure_prevents_link() {
        let (temp, config) = project(&[("kernel.c", "k"), ("drivers/bad.c", "FAIL")]);

        let err = build_kernel(&config).unwrap_err();

        let failures = err.downcast_ref::<CompileFailures>().unwrap();
        assert_eq!(failures.0.len(), 1);
        assert!(failures.0[0].subject.ends_with("drivers/bad.c"));
        assert!(!temp.path().join("linked").exists());
        assert!(!temp.path().join("isodir/boot/kernel.elf").exists());
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let (_temp, config) = project(&[("kernel.c", "k"), ("mm/pmm.c", "p"), ("mm/vmm.c", "v")]);

        let first = build_kernel(&config).unwrap();
        let image_first = fs::read(&first.image).unwrap();
        let staging = config.path(Path::new("bin/kernel"));
        let objects_first = fs::read(staging.join("mm/pmm.c.o")).unwrap();

        let second = build_kernel(&config).unwrap();

        assert_eq!(fs::read(&second.image).unwrap(), image_first);
        assert_eq!(fs::read(staging.join("mm/pmm.c.o")).unwrap(), objects_first);
    }

    #[test]
    fn test_empty_tree_is_error() {
        let (temp, config) = project(&[("include/kernel.h", "h")]);
        assert!(build_kernel(&config).is_err());
        assert!(!temp.path().join("linked").exists());
    }
}
