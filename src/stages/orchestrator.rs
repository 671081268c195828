//! The real stage implementations.

use anyhow::{Context, Result};
use std::io;

use crate::artifact::initrd::package_initrd;
use crate::artifact::iso::{build_iso, HostPlatform};
use crate::build::apps::build_apps;
use crate::build::kernel::build_kernel;
use crate::config::BuildConfig;
use crate::preflight::check_stage_tools;
use crate::qemu::{launch, LaunchMode};
use crate::stages::{Stage, StageRunner};

/// Runs stages against one project configuration.
pub struct Orchestrator {
    config: BuildConfig,
    platform: HostPlatform,
    preflight: bool,
}

impl Orchestrator {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            platform: HostPlatform::current(),
            preflight: true,
        }
    }

    /// Skip host-tool checks before each stage.
    pub fn without_preflight(mut self) -> Self {
        self.preflight = false;
        self
    }

    pub fn with_platform(mut self, platform: HostPlatform) -> Self {
        self.platform = platform;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    fn apps(&self) -> Result<()> {
        build_apps(&self.config)?;
        let root = self.config.path(&self.config.layout.initrd_root);
        let archive = self.config.path(&self.config.layout.initrd_archive);
        package_initrd(&root, &archive).context("packaging initrd")?;
        Ok(())
    }
}

impl StageRunner for Orchestrator {
    fn run_stage(&mut self, stage: Stage) -> Result<()> {
        if self.preflight {
            check_stage_tools(&self.config, stage, self.platform)
                .with_context(|| format!("preflight for stage '{stage}'"))?;
        }

        match stage {
            Stage::Kernel => {
                let kernel = build_kernel(&self.config)?;
                log::info!(
                    "[kernel] {} objects linked into {}",
                    kernel.objects,
                    kernel.image.display()
                );
            }
            Stage::Apps => self.apps()?,
            Stage::Iso => {
                let iso = build_iso(&self.config, self.platform)?;
                log::info!("[iso] wrote {}", iso.display());
            }
            Stage::Run => launch(&self.config, LaunchMode::Normal, &mut io::stdout())?,
            Stage::RunDebug => launch(&self.config, LaunchMode::Debug, &mut io::stdout())?,
        }
        Ok(())
    }
}
