//! Typed failures raised by the build pipeline.
//!
//! Stages return `anyhow::Result`, but the failures a caller may want to act
//! on are concrete types carried inside the `anyhow::Error`. Recover them
//! with [`anyhow::Error::downcast_ref`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Why an external tool invocation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The process could not be started at all.
    Spawn(String),
    /// The process ran and exited with a non-zero code.
    ExitCode(i32),
    /// The process was terminated without an exit code (e.g. by a signal).
    Terminated,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Spawn(reason) => write!(f, "could not start: {reason}"),
            FailureCause::ExitCode(code) => write!(f, "exited with status {code}"),
            FailureCause::Terminated => write!(f, "terminated without exit status"),
        }
    }
}

/// An external process (compiler, linker, sub-build, ISO tool, emulator...)
/// did not complete successfully.
#[derive(Debug, Clone, Error)]
#[error("{tool} failed for '{subject}': {cause}")]
pub struct ToolFailure {
    /// Program name as invoked.
    pub tool: String,
    /// The unit or path the invocation was working on.
    pub subject: String,
    pub cause: FailureCause,
    /// Tail of captured stderr, empty for interactive invocations.
    pub stderr: String,
}

/// Every unit that failed during one compile pass, in discovery order.
#[derive(Debug, Error)]
#[error("{} compile unit(s) failed: {}", .0.len(), subjects(.0))]
pub struct CompileFailures(pub Vec<ToolFailure>);

impl CompileFailures {
    /// Source paths of the failing units.
    pub fn subjects(&self) -> Vec<&str> {
        self.0.iter().map(|f| f.subject.as_str()).collect()
    }
}

fn subjects(failures: &[ToolFailure]) -> String {
    failures
        .iter()
        .map(|f| f.subject.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum BuildError {
    /// A compile invocation reported success but its artifact is missing.
    #[error("expected {expected} object artifacts, found {actual} (missing: {})", .missing.display())]
    DiscoveryMismatch {
        expected: usize,
        actual: usize,
        missing: PathBuf,
    },

    #[error("unknown stage selector '{0}'; expected one of: kernel, apps, iso, run, rund")]
    UnknownStage(String),

    /// A stage precondition on the filesystem was not met.
    #[error("missing {what}: {}", .path.display())]
    MissingInput { what: &'static str, path: PathBuf },
}
