use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use synapse_builder::stages::{dispatch, plan_from_args, DispatchReport, Orchestrator};
use synapse_builder::BuildConfig;

/// Build SynapseOS and boot it under QEMU.
///
/// Stages run in the order given. Without any, runs `kernel apps iso run`.
#[derive(Parser, Debug)]
#[command(name = "synapse-builder", version)]
struct Cli {
    /// Stages to run: kernel, apps, iso, run, rund
    #[arg(value_name = "STAGE")]
    stages: Vec<String>,

    /// Project root holding kernel/, apps/ and isodir/
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Configuration file (default: <root>/synapse.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parallel compile workers (default: available CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Do not check for host tools before each stage
    #[arg(long)]
    skip_preflight: bool,

    /// Debug logging, including every tool command line
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut orchestrator = match orchestrator_for(&cli) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            log::error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    let report = dispatch(&mut orchestrator, &plan_from_args(&cli.stages));
    summarize(&report);
    if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn orchestrator_for(cli: &Cli) -> Result<Orchestrator> {
    let root = std::fs::canonicalize(&cli.root)
        .with_context(|| format!("resolving project root '{}'", cli.root.display()))?;
    let mut config = BuildConfig::load(&root, cli.config.as_deref())?;
    if let Some(jobs) = cli.jobs {
        config.set_jobs(jobs)?;
    }

    let orchestrator = Orchestrator::new(config);
    Ok(if cli.skip_preflight {
        orchestrator.without_preflight()
    } else {
        orchestrator
    })
}

fn summarize(report: &DispatchReport) {
    let failed = report.failures().count();
    if report.success() {
        println!(
            "{} stage(s) done in {:.2}s",
            report.stages.len(),
            report.elapsed.as_secs_f64()
        );
        return;
    }
    println!(
        "{} stage(s) ran, {} failed, {} skipped, {} unknown",
        report.stages.len(),
        failed,
        report.skipped.len(),
        report.unknown.len()
    );
}
