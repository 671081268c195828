//! Compile stage: one compiler invocation per source unit.
//!
//! Units are independent, so they are compiled on a bounded pool of scoped
//! threads. Leaving the scope is the barrier: every invocation has finished
//! and reported before the stage decides anything. All failures are
//! collected, not only the first, and the stage fails if any unit failed.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use crate::artifact::filesystem::reset_dir;
use crate::build::discovery::SourceUnit;
use crate::config::BuildConfig;
use crate::error::{BuildError, CompileFailures, ToolFailure};
use crate::process::Cmd;

/// Compiler program and the fixed flag set applied to every unit.
#[derive(Debug, Clone)]
pub struct Compiler {
    pub program: String,
    pub flags: Vec<String>,
    pub include: PathBuf,
}

impl Compiler {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            program: config.toolchain.cc.clone(),
            flags: config.toolchain.cflags.clone(),
            include: config.path(&config.layout.kernel_include),
        }
    }

    /// `<cc> <flags> -I <include> -c <source> -o <object>`
    pub fn command(&self, unit: &SourceUnit) -> Cmd {
        Cmd::new(self.program.clone())
            .args(&self.flags)
            .arg("-I")
            .arg_path(&self.include)
            .arg("-c")
            .arg_path(&unit.source)
            .arg("-o")
            .arg_path(&unit.object)
            .subject(unit.source.display().to_string())
    }
}

/// Objects from a compile pass in which every unit succeeded.
///
/// Only [`compile_units`] constructs this, so holding one means the whole
/// set was built in this run. Order matches discovery order.
#[derive(Debug, Clone)]
pub struct CompiledObjects {
    objects: Vec<PathBuf>,
}

impl CompiledObjects {
    pub fn objects(&self) -> &[PathBuf] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Compile every unit into `staging_dir`, which is wiped first.
pub fn compile_units(
    compiler: &Compiler,
    units: &[SourceUnit],
    staging_dir: &Path,
    jobs: usize,
) -> Result<CompiledObjects> {
    reset_dir(staging_dir)?;
    for unit in units {
        if let Some(parent) = unit.object.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("creating object directory '{}'", parent.display())
            })?;
        }
    }

    let workers = jobs.clamp(1, units.len().max(1));
    log::info!(
        "[kernel] compiling {} units with {} worker(s)",
        units.len(),
        workers
    );

    let failures = run_pool(compiler, units, workers);
    if !failures.is_empty() {
        for failure in &failures {
            log::error!("[kernel] {failure}");
            if !failure.stderr.is_empty() {
                log::error!("{}", failure.stderr);
            }
        }
        return Err(CompileFailures(failures).into());
    }

    let missing: Vec<&PathBuf> = units
        .iter()
        .map(|u| &u.object)
        .filter(|object| !object.is_file())
        .collect();
    if let Some(first) = missing.first() {
        return Err(BuildError::DiscoveryMismatch {
            expected: units.len(),
            actual: units.len() - missing.len(),
            missing: (*first).clone(),
        }
        .into());
    }

    Ok(CompiledObjects {
        objects: units.iter().map(|u| u.object.clone()).collect(),
    })
}

/// Run all compile jobs and return the failures in discovery order.
fn run_pool(compiler: &Compiler, units: &[SourceUnit], workers: usize) -> Vec<ToolFailure> {
    let next = AtomicUsize::new(0);
    let failures: Mutex<Vec<(usize, ToolFailure)>> = Mutex::new(Vec::new());

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(unit) = units.get(index) else {
                    break;
                };
                log::info!("[kernel] CC {}", unit.relative.display());
                match compiler.command(unit).try_run() {
                    Ok(output) => {
                        let diagnostics = output.stderr.trim_end();
                        if !diagnostics.is_empty() {
                            log::warn!("[kernel] {}:\n{}", unit.relative.display(), diagnostics);
                        }
                    }
                    Err(failure) => failures
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((index, failure)),
                }
            });
        }
    });

    let mut failures = failures.into_inner().unwrap_or_else(PoisonError::into_inner);
    failures.sort_by_key(|(index, _)| *index);
    failures.into_iter().map(|(_, failure)| failure).collect()
}
