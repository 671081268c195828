//! Build stages and the selectors that name them on the command line.
//!
//! - [`dispatch`] - runs a plan of selectors and collects per-stage outcomes
//! - [`orchestrator`] - the real stage implementations behind [`StageRunner`]

pub mod dispatch;
pub mod orchestrator;

pub use dispatch::{dispatch, DispatchReport, StageReport, StageRunner};
pub use orchestrator::Orchestrator;

use std::fmt;

/// One selectable unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Compile and link the kernel image.
    Kernel,
    /// Run the apps sub-build, stage its output, package the initrd.
    Apps,
    /// Master the bootable ISO.
    Iso,
    /// Launch the emulator.
    Run,
    /// Launch the emulator halted, waiting for a debugger.
    RunDebug,
}

impl Stage {
    /// What a bare invocation runs.
    pub const DEFAULT_PIPELINE: [Stage; 4] = [Stage::Kernel, Stage::Apps, Stage::Iso, Stage::Run];

    pub const ALL: [Stage; 5] = [
        Stage::Kernel,
        Stage::Apps,
        Stage::Iso,
        Stage::Run,
        Stage::RunDebug,
    ];

    /// Command-line token for this stage.
    pub fn selector(self) -> &'static str {
        match self {
            Stage::Kernel => "kernel",
            Stage::Apps => "apps",
            Stage::Iso => "iso",
            Stage::Run => "run",
            Stage::RunDebug => "rund",
        }
    }

    pub fn from_selector(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.selector() == token)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

/// A command-line token, recognised or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Known(Stage),
    Unknown(String),
}

/// Turn command-line tokens into a plan.
///
/// No tokens selects the default pipeline. Otherwise each token becomes one
/// selector, in the order given; repeats are kept.
pub fn plan_from_args<S: AsRef<str>>(args: &[S]) -> Vec<Selector> {
    if args.is_empty() {
        return Stage::DEFAULT_PIPELINE
            .into_iter()
            .map(Selector::Known)
            .collect();
    }
    args.iter()
        .map(|token| {
            let token = token.as_ref();
            match Stage::from_selector(token) {
                Some(stage) => Selector::Known(stage),
                None => Selector::Unknown(token.to_string()),
            }
        })
        .collect()
}
