//! Stage dispatch.
//!
//! Runs a plan of selectors in order and turns what happened into a
//! [`DispatchReport`]. Unknown selectors are diagnosed and skipped without
//! stopping the plan. A failing stage stops every stage after it, because
//! each later stage consumes what the earlier ones produce. The report is
//! only successful when nothing failed and every selector was recognised.

use anyhow::Result;
use std::time::{Duration, Instant};

use crate::error::BuildError;
use crate::stages::{Selector, Stage};

/// Executes individual stages.
pub trait StageRunner {
    fn run_stage(&mut self, stage: Stage) -> Result<()>;
}

/// Outcome of one executed stage.
#[derive(Debug)]
pub struct StageReport {
    pub stage: Stage,
    pub elapsed: Duration,
    pub result: Result<()>,
}

impl StageReport {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Executed stages, in execution order.
    pub stages: Vec<StageReport>,
    /// One diagnostic per unrecognised selector.
    pub unknown: Vec<BuildError>,
    /// Stages not run because an earlier stage failed.
    pub skipped: Vec<Stage>,
    pub elapsed: Duration,
}

impl DispatchReport {
    pub fn success(&self) -> bool {
        self.unknown.is_empty() && self.stages.iter().all(StageReport::succeeded)
    }

    pub fn executed(&self) -> Vec<Stage> {
        self.stages.iter().map(|r| r.stage).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageReport> {
        self.stages.iter().filter(|r| !r.succeeded())
    }
}

/// Run `plan` against `runner`.
pub fn dispatch(runner: &mut dyn StageRunner, plan: &[Selector]) -> DispatchReport {
    let started = Instant::now();
    let mut report = DispatchReport::default();
    let mut halted = false;

    for selector in plan {
        match selector {
            Selector::Unknown(token) => {
                let err = BuildError::UnknownStage(token.clone());
                log::error!("{err}");
                report.unknown.push(err);
            }
            Selector::Known(stage) if halted => {
                log::warn!("[{stage}] skipped: an earlier stage failed");
                report.skipped.push(*stage);
            }
            Selector::Known(stage) => {
                let stage_started = Instant::now();
                log::info!("[{stage}] starting");
                let result = runner.run_stage(*stage);
                let elapsed = stage_started.elapsed();

                match &result {
                    Ok(()) => log::info!("[{stage}] finished in {:.2}s", elapsed.as_secs_f64()),
                    Err(err) => {
                        log::error!(
                            "[{stage}] failed after {:.2}s: {err:#}",
                            elapsed.as_secs_f64()
                        );
                        halted = true;
                    }
                }
                report.stages.push(StageReport {
                    stage: *stage,
                    elapsed,
                    result,
                });
            }
        }
    }

    report.elapsed = started.elapsed();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::plan_from_args;
    use anyhow::bail;

    /// Records the stages it is asked to run; fails the ones in `fail`.
    #[derive(Default)]
    struct Recorder {
        ran: Vec<Stage>,
        fail: Vec<Stage>,
    }

    impl StageRunner for Recorder {
        fn run_stage(&mut self, stage: Stage) -> Result<()> {
            self.ran.push(stage);
            if self.fail.contains(&stage) {
                bail!("{stage} broke");
            }
            Ok(())
        }
    }

    #[test]
    fn test_default_pipeline_order() {
        let mut runner = Recorder::default();

        let report = dispatch(&mut runner, &plan_from_args::<&str>(&[]));

        assert!(report.success());
        assert_eq!(
            runner.ran,
            vec![Stage::Kernel, Stage::Apps, Stage::Iso, Stage::Run]
        );
    }

    #[test]
    fn test_unknown_selector_does_not_stop_dispatch_but_fails_report() {
        let mut runner = Recorder::default();

        let report = dispatch(&mut runner, &plan_from_args(&["kernel", "bogus", "iso"]));

        assert_eq!(runner.ran, vec![Stage::Kernel, Stage::Iso]);
        assert!(report.stages.iter().all(StageReport::succeeded));
        assert_eq!(report.unknown.len(), 1);
        assert!(matches!(&report.unknown[0], BuildError::UnknownStage(t) if t == "bogus"));
        assert!(!report.success());
    }

    #[test]
    fn test_repeats_run_every_time() {
        let mut runner = Recorder::default();
        dispatch(&mut runner, &plan_from_args(&["iso", "iso", "kernel"]));
        assert_eq!(runner.ran, vec![Stage::Iso, Stage::Iso, Stage::Kernel]);
    }

    #[test]
    fn test_failure_halts_later_stages() {
        let mut runner = Recorder {
            fail: vec![Stage::Apps],
            ..Default::default()
        };

        let report = dispatch(&mut runner, &plan_from_args::<&str>(&[]));

        assert_eq!(runner.ran, vec![Stage::Kernel, Stage::Apps]);
        assert_eq!(report.skipped, vec![Stage::Iso, Stage::Run]);
        assert_eq!(report.executed(), vec![Stage::Kernel, Stage::Apps]);
        let failed: Vec<_> = report.failures().map(|r| r.stage).collect();
        assert_eq!(failed, vec![Stage::Apps]);
        assert!(!report.success());
    }

    #[test]
    fn test_unknown_after_failure_is_still_diagnosed() {
        let mut runner = Recorder {
            fail: vec![Stage::Kernel],
            ..Default::default()
        };

        let report = dispatch(&mut runner, &plan_from_args(&["kernel", "isoo", "run"]));

        assert_eq!(report.unknown.len(), 1);
        assert_eq!(report.skipped, vec![Stage::Run]);
    }
}
