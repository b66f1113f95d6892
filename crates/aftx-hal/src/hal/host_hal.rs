//! Host HAL implementation that spawns real processes.

use super::{CommandOutput, ProcessOps, RunStatus};
use crate::{HalError, HalResult};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Real HAL implementation backed by `std::process`.
#[derive(Debug, Clone, Default)]
pub struct HostHal;

impl HostHal {
    pub fn new() -> Self {
        Self
    }
}

fn map_command_err(program: &str, err: std::io::Error) -> HalError {
    match err.kind() {
        std::io::ErrorKind::NotFound => HalError::CommandNotFound(program.to_string()),
        std::io::ErrorKind::PermissionDenied => HalError::PermissionDenied(program.to_string()),
        _ => HalError::Io(err),
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn output_with_timeout(
    program: &str,
    cmd: &mut Command,
    timeout: Option<Duration>,
) -> HalResult<CommandOutput> {
    // Avoid commands hanging waiting for input.
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| map_command_err(program, e))?;

    // Drain pipes concurrently to avoid deadlocks on large output.
    let stdout_handle = drain(child.stdout.take());
    let stderr_handle = drain(child.stderr.take());

    let status = match timeout {
        Some(limit) => match child.wait_timeout(limit)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(HalError::CommandTimeout {
                    program: program.to_string(),
                    timeout_secs: limit.as_secs(),
                });
            }
        },
        None => child.wait()?,
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    let run_status = match status.code() {
        Some(code) => RunStatus::Exited(code),
        None => RunStatus::Terminated,
    };
    Ok(CommandOutput::from_streams(run_status, &stdout, &stderr))
}

impl ProcessOps for HostHal {
    fn command_output_with_cwd(
        &self,
        program: &str,
        args: &[&str],
        cwd: Option<&Path>,
        timeout: Option<Duration>,
    ) -> HalResult<CommandOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        output_with_timeout(program, &mut cmd, timeout)
    }
}
