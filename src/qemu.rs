//! Emulator launcher.
//!
//! Provides `QemuBuilder` for constructing the `qemu-system-i386` command
//! with the fixed SynapseOS hardware profile, and [`launch`] for the `run`
//! and `rund` stages. Both block until the emulator exits; there is no
//! timeout.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::artifact::disk::DiskImage;
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::process::Cmd;

const DEFAULT_GDB_PORT: u16 = 1234;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    Normal,
    /// CPU halted at startup with a GDB endpoint open.
    Debug,
}

/// Builder for QEMU commands.
#[derive(Debug, Clone)]
pub struct QemuBuilder {
    binary: String,
    name: String,
    memory_mib: u32,
    sound_args: Vec<String>,
    nic_model: String,
    mac: String,
    netdev_listen: String,
    cdrom: Option<PathBuf>,
    hard_disk: Option<PathBuf>,
    serial_log: Option<PathBuf>,
    gdb_port: Option<u16>,
}

impl QemuBuilder {
    /// Start from the configured hardware profile, with no media attached.
    pub fn new(config: &BuildConfig) -> Self {
        let emu = &config.emulator;
        Self {
            binary: emu.binary.clone(),
            name: emu.name.clone(),
            memory_mib: emu.memory_mib,
            sound_args: emu.sound_args.clone(),
            nic_model: emu.nic_model.clone(),
            mac: emu.mac.clone(),
            netdev_listen: emu.netdev_listen.clone(),
            cdrom: None,
            hard_disk: None,
            serial_log: None,
            gdb_port: None,
        }
    }

    pub fn cdrom(mut self, path: PathBuf) -> Self {
        self.cdrom = Some(path);
        self
    }

    pub fn hard_disk(mut self, path: PathBuf) -> Self {
        self.hard_disk = Some(path);
        self
    }

    pub fn serial_log(mut self, path: PathBuf) -> Self {
        self.serial_log = Some(path);
        self
    }

    /// Halt the CPU at startup and listen for GDB on `port`.
    pub fn debug_halted(mut self, port: u16) -> Self {
        self.gdb_port = Some(port);
        self
    }

    pub fn build(self) -> Cmd {
        let mut cmd = Cmd::new(self.binary.clone())
            .args(["-name", &self.name])
            .args(&self.sound_args)
            .args(["-m", &self.memory_mib.to_string()]);

        // NIC on a socket backend so a second instance can connect to it
        cmd = cmd.args([
            "-netdev".to_string(),
            format!("socket,id=n0,listen={}", self.netdev_listen),
            "-device".to_string(),
            format!("{},netdev=n0,mac={}", self.nic_model, self.mac),
        ]);

        if let Some(iso) = &self.cdrom {
            cmd = cmd.arg("-cdrom").arg_path(iso);
        }
        if let Some(disk) = &self.hard_disk {
            cmd = cmd.arg("-hda").arg_path(disk);
        }
        if let Some(log) = &self.serial_log {
            cmd = cmd.arg("-serial").arg(format!("file:{}", log.display()));
        }
        match self.gdb_port {
            // `-s` is QEMU's shorthand for `-gdb tcp::1234`
            Some(DEFAULT_GDB_PORT) => cmd = cmd.args(["-s", "-S"]),
            Some(port) => {
                cmd = cmd.args(["-gdb".to_string(), format!("tcp::{port}"), "-S".to_string()])
            }
            None => {}
        }
        cmd
    }
}

/// Command for one launch of the built ISO with the persistent disk.
pub fn emulator_command(config: &BuildConfig, mode: LaunchMode) -> Cmd {
    let mut builder = QemuBuilder::new(config)
        .cdrom(config.path(&config.layout.iso_image))
        .hard_disk(config.path(&config.layout.disk_image))
        .serial_log(config.path(&config.layout.serial_log));
    if mode == LaunchMode::Debug {
        builder = builder.debug_halted(config.emulator.gdb_port);
    }
    builder
        .build()
        .current_dir(config.root())
        .subject(config.layout.iso_image.display().to_string())
}

/// How to attach a debugger to a halted `rund` session.
pub fn attach_hint(kernel_image: &Path, gdb_port: u16) -> String {
    format!(
        "gdb {} -ex \"target remote localhost:{}\"",
        kernel_image.display(),
        gdb_port
    )
}

/// Ensure the disk image exists, then run the emulator until it exits.
///
/// In debug mode the attach hint is written to `hint_out` before the
/// emulator starts.
pub fn launch(config: &BuildConfig, mode: LaunchMode, hint_out: &mut dyn Write) -> Result<()> {
    let iso = config.path(&config.layout.iso_image);
    if !iso.is_file() {
        return Err(BuildError::MissingInput {
            what: "ISO image (run the iso stage first)",
            path: iso,
        }
        .into());
    }
    DiskImage::from_config(config).ensure()?;

    let cmd = emulator_command(config, mode);
    if mode == LaunchMode::Debug {
        writeln!(
            hint_out,
            "{}",
            attach_hint(&config.layout.kernel_image, config.emulator.gdb_port)
        )
        .and_then(|()| hint_out.flush())
        .context("writing debugger attach hint")?;
    }

    log::info!(
        "[run] starting {} ({} MiB, serial -> {})",
        config.emulator.binary,
        config.emulator.memory_mib,
        config.layout.serial_log.display()
    );
    cmd.error_msg("emulator exited with failure").run_interactive()
}
