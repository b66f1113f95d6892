//! Process execution helpers.
//!
//! External commands are considered "world-touching" and must go through the HAL so we can
//! test workflows without spawning real processes.

use crate::{HalError, HalResult};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The process exited with the given code.
    Exited(i32),
    /// The process ended without an exit code (killed by a signal).
    Terminated,
    /// The process was killed after exceeding its timeout.
    TimedOut,
    /// The process could not be started at all.
    NotStarted,
}

/// Combined output of one external command.
///
/// `text` holds stdout followed by stderr with trailing whitespace removed. The relative
/// ordering of lines from the two streams is not preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub status: RunStatus,
}

impl CommandOutput {
    pub fn new(status: RunStatus, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status,
        }
    }

    pub fn exited(code: i32, text: impl Into<String>) -> Self {
        Self::new(RunStatus::Exited(code), text)
    }

    pub fn not_started() -> Self {
        Self::new(RunStatus::NotStarted, String::new())
    }

    pub fn timed_out() -> Self {
        Self::new(RunStatus::TimedOut, String::new())
    }

    /// Build from raw stdout/stderr buffers.
    pub fn from_streams(status: RunStatus, stdout: &[u8], stderr: &[u8]) -> Self {
        let mut text = String::from_utf8_lossy(stdout).into_owned();
        let err = String::from_utf8_lossy(stderr);
        if !err.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&err);
        }
        let trimmed = text.trim_end().len();
        text.truncate(trimmed);
        Self { text, status }
    }

    /// True only when the process ran and exited with code 0.
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Exited(0)
    }

    pub fn started(&self) -> bool {
        self.status != RunStatus::NotStarted
    }
}

/// A program invocation: executable, arguments and an optional timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the timeout. `None` blocks until the process exits.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Process execution trait (external command runner).
pub trait ProcessOps: Send + Sync {
    fn command_output_with_cwd(
        &self,
        program: &str,
        args: &[&str],
        cwd: Option<&Path>,
        timeout: Option<Duration>,
    ) -> HalResult<CommandOutput>;

    fn command_output(
        &self,
        program: &str,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> HalResult<CommandOutput> {
        self.command_output_with_cwd(program, args, None, timeout)
    }

    /// Run a command and always return its output.
    ///
    /// Spawn failures become [`RunStatus::NotStarted`] and timeouts [`RunStatus::TimedOut`],
    /// both with empty text, so callers treat them like any other failed operation.
    fn run(&self, command: &CommandLine) -> CommandOutput {
        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
        log::debug!("exec: {}", command);
        match self.command_output(&command.program, &args, command.timeout) {
            Ok(output) => output,
            Err(HalError::CommandTimeout {
                program,
                timeout_secs,
            }) => {
                log::warn!("{} timed out after {}s", program, timeout_secs);
                CommandOutput::timed_out()
            }
            Err(err) => {
                log::warn!("could not start `{}`: {}", command, err);
                CommandOutput::not_started()
            }
        }
    }
}
