//! External command execution.
//!
//! `Cmd` wraps `std::process::Command` so every tool invocation in the build
//! is logged the same way, checks its exit status, and reports failures as a
//! typed [`ToolFailure`].
//!
//! # Example
//!
//! ```rust,ignore
//! use synapse_builder::process::Cmd;
//! use std::path::Path;
//!
//! Cmd::new("grub-mkrescue")
//!     .arg("-o")
//!     .arg_path(Path::new("SynapseOS.iso"))
//!     .arg_path(Path::new("isodir"))
//!     .args(["-V", "SynapseOS"])
//!     .error_msg("grub-mkrescue failed. Install grub2 and xorriso.")
//!     .run_interactive()?;
//! ```

use anyhow::{bail, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};

use crate::error::{FailureCause, ToolFailure};

/// Bytes of stderr kept on a failure.
const STDERR_TAIL: usize = 4096;

/// Captured output of a successful command.
#[derive(Debug, Clone)]
pub struct CmdResult {
    pub stdout: String,
    pub stderr: String,
}

/// Builder for one external tool invocation.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    subject: Option<String>,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            subject: None,
            error_msg: None,
        }
    }

    /// Build a command from a configured argv such as `["python3", "build.py"]`.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let Some((program, rest)) = argv.split_first() else {
            bail!("empty command line in configuration");
        };
        Ok(Self::new(program.clone()).args(rest))
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.as_os_str().to_owned());
        self
    }

    /// Run the process in `dir` instead of inheriting our working directory.
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Name the unit or path this invocation works on; it appears in failures.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Hint attached as context when the command fails.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments after the program name, lossily converted for inspection.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Printable command line, used for logging.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.arg_strings())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run with captured output, returning the typed failure on error.
    pub fn try_run(self) -> std::result::Result<CmdResult, ToolFailure> {
        log::debug!("$ {}", self.command_line());
        let output: Output = match self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
        {
            Ok(output) => output,
            Err(e) => return Err(self.failure(FailureCause::Spawn(e.to_string()), String::new())),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            return Ok(CmdResult { stdout, stderr });
        }
        Err(self.failure(cause_of(output.status), tail(&stderr)))
    }

    /// Run with inherited stdio and block until exit, returning the typed failure.
    pub fn try_run_interactive(self) -> std::result::Result<(), ToolFailure> {
        log::debug!("$ {}", self.command_line());
        match self.command().status() {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(self.failure(cause_of(status), String::new())),
            Err(e) => Err(self.failure(FailureCause::Spawn(e.to_string()), String::new())),
        }
    }

    /// Run with captured output.
    pub fn run(self) -> Result<CmdResult> {
        let hint = self.error_msg.clone();
        with_hint(self.try_run(), hint)
    }

    /// Run with inherited stdio so the user sees the tool's own progress.
    pub fn run_interactive(self) -> Result<()> {
        let hint = self.error_msg.clone();
        with_hint(self.try_run_interactive(), hint)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn failure(&self, cause: FailureCause, stderr: String) -> ToolFailure {
        let subject = self
            .subject
            .clone()
            .or_else(|| self.cwd.as_ref().map(|d| d.display().to_string()))
            .unwrap_or_else(|| self.command_line());
        ToolFailure {
            tool: self.program.clone(),
            subject,
            cause,
            stderr,
        }
    }
}

fn with_hint<T>(result: std::result::Result<T, ToolFailure>, hint: Option<String>) -> Result<T> {
    match (result, hint) {
        (Ok(value), _) => Ok(value),
        (Err(failure), Some(hint)) => Err(anyhow::Error::new(failure).context(hint)),
        (Err(failure), None) => Err(failure.into()),
    }
}

fn cause_of(status: ExitStatus) -> FailureCause {
    match status.code() {
        Some(code) => FailureCause::ExitCode(code),
        None => FailureCause::Terminated,
    }
}

fn tail(stderr: &str) -> String {
    let trimmed = stderr.trim_end();
    if trimmed.len() <= STDERR_TAIL {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}
