//! Project layout and tool configuration.
//!
//! Every path the pipeline touches is fixed relative to a project root. The
//! defaults reproduce the SynapseOS tree; an optional `synapse.toml` at the
//! root (or a file passed with `--config`) overrides any subset of them:
//!
//! ```toml
//! [toolchain]
//! cc = "clang-17"
//! jobs = 4
//!
//! [emulator]
//! memory_mib = 64
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the implicit per-project configuration file.
pub const CONFIG_FILENAME: &str = "synapse.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Layout {
    /// Kernel source tree walked by discovery.
    pub kernel_src: PathBuf,
    pub kernel_include: PathBuf,
    pub linker_script: PathBuf,
    /// Kernel object staging directory, wiped every kernel build.
    pub kernel_objects: PathBuf,
    /// Apps sub-project; the sub-build runs with this as working directory.
    pub apps_dir: PathBuf,
    /// Where the apps sub-build leaves its binaries.
    pub apps_output: PathBuf,
    /// Initrd staging root, archived as a whole.
    pub initrd_root: PathBuf,
    /// Apps subtree inside the initrd root, relative to it.
    pub initrd_apps: PathBuf,
    /// Tree handed to the ISO mastering tool.
    pub iso_root: PathBuf,
    pub kernel_image: PathBuf,
    pub initrd_archive: PathBuf,
    pub iso_image: PathBuf,
    pub disk_image: PathBuf,
    pub serial_log: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            kernel_src: "kernel".into(),
            kernel_include: "kernel/include".into(),
            linker_script: "kernel/link.ld".into(),
            kernel_objects: "bin/kernel".into(),
            apps_dir: "apps".into(),
            apps_output: "bin/apps".into(),
            initrd_root: "initrd".into(),
            initrd_apps: "apps".into(),
            iso_root: "isodir".into(),
            kernel_image: "isodir/boot/kernel.elf".into(),
            initrd_archive: "isodir/boot/initrd.tar".into(),
            iso_image: "SynapseOS.iso".into(),
            disk_image: "ata.vhd".into(),
            serial_log: "Qemu.log".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Toolchain {
    pub cc: String,
    /// Flags placed before `-I <include> -c <src> -o <obj>`.
    pub cflags: Vec<String>,
    pub linker: String,
    /// Flags placed before `-T <script> -o <image> <objects...>`.
    pub ldflags: Vec<String>,
    /// Apps sub-build command line, run inside `layout.apps_dir`.
    pub apps_build: Vec<String>,
    /// Compile workers; defaults to available parallelism.
    pub jobs: Option<usize>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            cc: "clang".into(),
            cflags: [
                "-target",
                "i386-pc-none-elf",
                "-w",
                "-mno-sse",
                "-mno-avx",
                "-O0",
                "-ffreestanding",
            ]
            .map(String::from)
            .to_vec(),
            linker: "ld.lld".into(),
            ldflags: vec!["-nostdlib".into()],
            apps_build: vec!["python3".into(), "build.py".into()],
            jobs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IsoConfig {
    pub tool: String,
    pub volume_label: String,
    /// Prefix used to reach the mastering tool on non-POSIX hosts.
    pub wrapper: Vec<String>,
}

impl Default for IsoConfig {
    fn default() -> Self {
        Self {
            tool: "grub-mkrescue".into(),
            volume_label: "SynapseOS".into(),
            wrapper: vec!["ubuntu".into(), "run".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmulatorConfig {
    pub binary: String,
    pub name: String,
    pub memory_mib: u32,
    /// Sound device arguments, passed verbatim. QEMU 7.1 and later reject
    /// `-soundhw`; use e.g. `["-machine", "pcspk-audiodev=snd0", "-audiodev",
    /// "none,id=snd0"]` there.
    pub sound_args: Vec<String>,
    pub nic_model: String,
    pub mac: String,
    /// Listen address of the socket netdev.
    pub netdev_listen: String,
    pub gdb_port: u16,
    /// Raw image creation utility.
    pub disk_tool: String,
    pub disk_size_mib: u64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            binary: "qemu-system-i386".into(),
            name: "SynapseOS".into(),
            memory_mib: 16,
            sound_args: vec!["-soundhw".into(), "pcspk".into()],
            nic_model: "rtl8139".into(),
            mac: "11:11:11:11:11:11".into(),
            netdev_listen: ":2030".into(),
            gdb_port: 1234,
            disk_tool: "qemu-img".into(),
            disk_size_mib: 32,
        }
    }
}

/// Complete configuration, bound to a project root.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    #[serde(skip)]
    root: PathBuf,
    pub layout: Layout,
    pub toolchain: Toolchain,
    pub iso: IsoConfig,
    pub emulator: EmulatorConfig,
}

impl BuildConfig {
    /// Built-in defaults for a project at `root`.
    pub fn with_defaults(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ..Self::default()
        }
    }

    /// Load configuration for `root`.
    ///
    /// An explicit `config_file` must exist. Without one, `synapse.toml` at the
    /// root is used when present and the defaults otherwise.
    pub fn load(root: &Path, config_file: Option<&Path>) -> Result<Self> {
        let path = match config_file {
            Some(path) => {
                let path = resolve(root, path);
                if !path.is_file() {
                    bail!("configuration file '{}' does not exist", path.display());
                }
                path
            }
            None => {
                let implicit = root.join(CONFIG_FILENAME);
                if !implicit.is_file() {
                    log::debug!("no {} under '{}'; using defaults", CONFIG_FILENAME, root.display());
                    return Ok(Self::with_defaults(root));
                }
                implicit
            }
        };

        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading configuration '{}'", path.display()))?;
        let mut config = Self::parse(&text)
            .with_context(|| format!("parsing configuration '{}'", path.display()))?;
        config.root = root.to_path_buf();
        log::debug!("loaded configuration from '{}'", path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document. The root is left empty.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.toolchain.jobs == Some(0) {
            bail!("toolchain.jobs must be at least 1");
        }
        if self.toolchain.apps_build.is_empty() {
            bail!("toolchain.apps_build must name a command");
        }
        if self.emulator.disk_size_mib == 0 {
            bail!("emulator.disk_size_mib must be at least 1");
        }
        if self.emulator.memory_mib == 0 {
            bail!("emulator.memory_mib must be at least 1");
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a layout path against the project root.
    pub fn path(&self, relative: &Path) -> PathBuf {
        resolve(&self.root, relative)
    }

    /// Override the compile worker count (from `--jobs`).
    pub fn set_jobs(&mut self, jobs: usize) -> Result<()> {
        if jobs == 0 {
            bail!("--jobs must be at least 1");
        }
        self.toolchain.jobs = Some(jobs);
        Ok(())
    }

    /// Effective compile worker count.
    pub fn jobs(&self) -> usize {
        match self.toolchain.jobs {
            Some(jobs) => jobs,
            None => match std::thread::available_parallelism() {
                Ok(n) => n.get(),
                Err(e) => {
                    log::warn!("could not detect CPU count ({e}), using 4 compile workers");
                    4
                }
            },
        }
    }

    pub fn initrd_apps_dir(&self) -> PathBuf {
        self.path(&self.layout.initrd_root)
            .join(&self.layout.initrd_apps)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_project_layout() {
        let config = BuildConfig::with_defaults(Path::new("/proj"));

        assert_eq!(config.path(&config.layout.kernel_src), Path::new("/proj/kernel"));
        assert_eq!(config.initrd_apps_dir(), Path::new("/proj/initrd/apps"));
        assert_eq!(config.emulator.disk_size_mib, 32);
        assert_eq!(config.iso.volume_label, "SynapseOS");
        assert!(config.toolchain.cflags.iter().any(|f| f == "-ffreestanding"));
    }

    #[test]
    fn test_absolute_paths_pass_through() {
        let mut config = BuildConfig::with_defaults(Path::new("/proj"));
        config.layout.disk_image = "/var/lib/synapse/ata.vhd".into();
        assert_eq!(
            config.path(&config.layout.disk_image),
            Path::new("/var/lib/synapse/ata.vhd")
        );
    }

    #[test]
    fn test_partial_override() {
        let config = BuildConfig::parse(
            "[toolchain]\ncc = \"clang-17\"\njobs = 2\n\n[emulator]\nmemory_mib = 64\n",
        )
        .unwrap();

        assert_eq!(config.toolchain.cc, "clang-17");
        assert_eq!(config.jobs(), 2);
        assert_eq!(config.emulator.memory_mib, 64);
        // untouched values keep their defaults
        assert_eq!(config.toolchain.linker, "ld.lld");
        assert_eq!(config.emulator.mac, "11:11:11:11:11:11");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(BuildConfig::parse("[toolchain]\ncompiler = \"gcc\"\n").is_err());
        assert!(BuildConfig::parse("[linker]\n").is_err());
    }

    #[test]
    fn test_validation() {
        assert!(BuildConfig::parse("[toolchain]\njobs = 0\n").is_err());
        assert!(BuildConfig::parse("[toolchain]\napps_build = []\n").is_err());
        assert!(BuildConfig::parse("[emulator]\ndisk_size_mib = 0\n").is_err());
    }

    #[test]
    fn test_load_implicit_and_explicit() {
        let temp = TempDir::new().unwrap();

        let defaults = BuildConfig::load(temp.path(), None).unwrap();
        assert_eq!(defaults.root(), temp.path());
        assert_eq!(defaults.toolchain.cc, "clang");

        fs::write(temp.path().join(CONFIG_FILENAME), "[iso]\nvolume_label = \"SYN\"\n").unwrap();
        let implicit = BuildConfig::load(temp.path(), None).unwrap();
        assert_eq!(implicit.iso.volume_label, "SYN");
        assert_eq!(implicit.root(), temp.path());

        let missing = BuildConfig::load(temp.path(), Some(Path::new("other.toml")));
        assert!(missing.is_err());
    }

    #[test]
    fn test_set_jobs_rejects_zero() {
        let mut config = BuildConfig::with_defaults(Path::new("."));
        assert!(config.set_jobs(0).is_err());
        config.set_jobs(3).unwrap();
        assert_eq!(config.jobs(), 3);
    }
}
