//! Build-and-launch orchestration for SynapseOS.
//!
//! Turns the kernel and application sources of a SynapseOS checkout into a
//! bootable ISO and runs it under QEMU. The work is split into stages that
//! the command line selects by name:
//!
//! - **kernel** - compile every `.c`/`.s` unit under the kernel tree in
//!   parallel, then link them into `isodir/boot/kernel.elf`
//! - **apps** - run the apps sub-build, copy its output into the initrd tree,
//!   and package `isodir/boot/initrd.tar`
//! - **iso** - master `SynapseOS.iso` with grub-mkrescue
//! - **run** / **rund** - boot the ISO, the latter halted for a debugger
//!
//! # Architecture
//!
//! ```text
//! synapse-builder (bin)
//!     │
//!     ├── stages::plan_from_args   tokens -> selectors
//!     ├── stages::dispatch         selectors -> DispatchReport
//!     └── stages::Orchestrator     Stage -> build / artifact / qemu
//!             │
//!             ├── preflight        host tools per stage
//!             ├── build            discovery, compile pool, link, apps
//!             ├── artifact         initrd tar, ISO, disk image
//!             └── qemu             emulator command and launch
//! ```
//!
//! Every external tool goes through [`process::Cmd`], which never changes
//! the process working directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use synapse_builder::stages::{dispatch, plan_from_args, Orchestrator};
//! use synapse_builder::BuildConfig;
//! use std::path::Path;
//!
//! let config = BuildConfig::load(Path::new("."), None)?;
//! let mut orchestrator = Orchestrator::new(config);
//! let report = dispatch(&mut orchestrator, &plan_from_args(&["kernel", "iso"]));
//! assert!(report.success());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod artifact;
pub mod build;
pub mod config;
pub mod error;
pub mod preflight;
pub mod process;
pub mod qemu;
pub mod stages;

#[cfg(all(test, unix))]
mod test_support;

pub use config::BuildConfig;
pub use error::{BuildError, CompileFailures, FailureCause, ToolFailure};
pub use stages::{dispatch, DispatchReport, Orchestrator, Stage};
