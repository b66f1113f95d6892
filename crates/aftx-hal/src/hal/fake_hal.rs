//! Fake HAL implementation for testing.
//!
//! This implementation records all invocations without spawning anything and replies from a
//! script of canned outputs, allowing CI-safe testing without adb, fastboot or a device.

use super::{CommandOutput, ProcessOps};
use crate::{HalError, HalResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Command {
        program: String,
        args: Vec<String>,
        cwd: Option<PathBuf>,
        timeout_secs: Option<u64>,
    },
}

impl Operation {
    /// The invocation rendered as `program arg arg ...`.
    pub fn command_text(&self) -> String {
        match self {
            Operation::Command { program, args, .. } => {
                let mut text = program.clone();
                for arg in args {
                    text.push(' ');
                    text.push_str(arg);
                }
                text
            }
        }
    }
}

/// What a scripted invocation should produce.
#[derive(Debug, Clone)]
pub enum FakeReply {
    Output(CommandOutput),
    SpawnFailure,
    Timeout,
}

impl FakeReply {
    pub fn ok(text: impl Into<String>) -> Self {
        FakeReply::Output(CommandOutput::exited(0, text))
    }

    pub fn exit(code: i32, text: impl Into<String>) -> Self {
        FakeReply::Output(CommandOutput::exited(code, text))
    }
}

#[derive(Debug, Clone)]
struct Script {
    program: String,
    needle: String,
    reply: FakeReply,
    persistent: bool,
}

impl Script {
    fn matches(&self, program: &str, rendered_args: &str) -> bool {
        self.program == program && rendered_args.contains(&self.needle)
    }
}

#[derive(Debug, Clone, Default)]
struct FakeHalState {
    operations: Vec<Operation>,
    /// Consulted in insertion order.
    scripts: Vec<Script>,
}

/// Fake HAL implementation that records operations without executing them.
///
/// Replies are matched on program name plus a substring of the space-joined arguments.
/// One-shot replies ([`FakeHal::expect`]) are consumed in FIFO order and take precedence over
/// persistent ones ([`FakeHal::stub`]). Unmatched calls succeed with empty output.
#[derive(Debug, Clone, Default)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

impl FakeHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply used once by the next matching invocation.
    pub fn expect(&self, program: &str, needle: &str, reply: FakeReply) -> &Self {
        self.push_script(program, needle, reply, false);
        self
    }

    /// Register a reply used by every matching invocation.
    pub fn stub(&self, program: &str, needle: &str, reply: FakeReply) -> &Self {
        self.push_script(program, needle, reply, true);
        self
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    pub fn operation_count(&self) -> usize {
        self.lock().operations.len()
    }

    /// True if any recorded operation satisfies `check`.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.lock().operations.iter().any(check)
    }

    /// Rendered command lines of every recorded invocation.
    pub fn commands(&self) -> Vec<String> {
        self.operations()
            .iter()
            .map(Operation::command_text)
            .collect()
    }

    /// Forget recorded operations and every scripted reply.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.operations.clear();
        state.scripts.clear();
    }

    fn lock(&self) -> MutexGuard<'_, FakeHalState> {
        // A panicking test thread must not hide the script from the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push_script(&self, program: &str, needle: &str, reply: FakeReply, persistent: bool) {
        self.lock().scripts.push(Script {
            program: program.to_string(),
            needle: needle.to_string(),
            reply,
            persistent,
        });
    }

    fn record_operation(&self, op: Operation) {
        self.lock().operations.push(op);
    }

    fn take_reply(&self, program: &str, args: &[&str]) -> Option<FakeReply> {
        let rendered = args.join(" ");
        let mut state = self.lock();
        if let Some(idx) = state
            .scripts
            .iter()
            .position(|s| !s.persistent && s.matches(program, &rendered))
        {
            return Some(state.scripts.remove(idx).reply);
        }
        state
            .scripts
            .iter()
            .find(|s| s.persistent && s.matches(program, &rendered))
            .map(|s| s.reply.clone())
    }
}

impl ProcessOps for FakeHal {
    fn command_output_with_cwd(
        &self,
        program: &str,
        args: &[&str],
        cwd: Option<&Path>,
        timeout: Option<Duration>,
    ) -> HalResult<CommandOutput> {
        self.record_operation(Operation::Command {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: cwd.map(Path::to_path_buf),
            timeout_secs: timeout.map(|t| t.as_secs()),
        });
        log::debug!("fake exec: {} {}", program, args.join(" "));

        match self.take_reply(program, args) {
            Some(FakeReply::Output(output)) => Ok(output),
            Some(FakeReply::SpawnFailure) => Err(HalError::CommandNotFound(program.to_string())),
            Some(FakeReply::Timeout) => Err(HalError::CommandTimeout {
                program: program.to_string(),
                timeout_secs: timeout.map(|t| t.as_secs()).unwrap_or(0),
            }),
            None => Ok(CommandOutput::exited(0, "")),
        }
    }
}
