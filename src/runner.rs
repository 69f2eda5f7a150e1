//! External command execution.
//!
//! Short checks go through [`CommandRunner::exec`], which runs a command
//! line through the platform shell and captures everything. Long-running
//! commands go through [`CommandRunner::stream`], which hands every output
//! line to a callback as soon as it is read.

use std::borrow::Cow;
use std::io;
use std::process::Stdio;

use futures_util::future::LocalBoxFuture;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub trait CommandRunner {
    /// Run `command_line` to completion and capture its output.
    ///
    /// A command that cannot be spawned at all is reported as an `Err`; a
    /// command that runs and exits non-zero is an `Ok` with that exit code.
    fn exec<'a>(&'a self, command_line: &'a str) -> LocalBoxFuture<'a, io::Result<CommandOutput>>;

    /// Spawn `program`, feeding stdout and stderr lines to `on_line` in
    /// arrival order, and resolve with the exit code once the process exits.
    fn stream<'a>(
        &'a self,
        program: &'a str,
        args: &'a [&'a str],
        on_line: &'a mut dyn FnMut(&str),
    ) -> LocalBoxFuture<'a, io::Result<Option<i32>>>;
}

/// Runs commands on the host via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

fn shell_command(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command_line]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command_line]);
        cmd
    }
}

/// Output lines are decoded lossily; a stray non-UTF-8 byte must not hide
/// the rest of the output.
fn decode_line(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes)
}

impl CommandRunner for SystemRunner {
    fn exec<'a>(&'a self, command_line: &'a str) -> LocalBoxFuture<'a, io::Result<CommandOutput>> {
        Box::pin(async move {
            tracing::debug!(command = command_line, "executing");
            let output = shell_command(command_line)
                .stdin(Stdio::null())
                .output()
                .await?;

            let result = CommandOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };
            tracing::debug!(command = command_line, exit_code = ?result.exit_code, "command finished");
            Ok(result)
        })
    }

    fn stream<'a>(
        &'a self,
        program: &'a str,
        args: &'a [&'a str],
        on_line: &'a mut dyn FnMut(&str),
    ) -> LocalBoxFuture<'a, io::Result<Option<i32>>> {
        Box::pin(async move {
            tracing::debug!(program, ?args, "spawning");
            let mut child = Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()?;

            let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
                return Err(io::Error::other(format!("{program}: output pipes were not captured")));
            };

            let mut out = BufReader::new(stdout).split(b'\n');
            let mut err = BufReader::new(stderr).split(b'\n');
            let mut out_open = true;
            let mut err_open = true;

            while out_open || err_open {
                tokio::select! {
                    line = out.next_segment(), if out_open => match line? {
                        Some(bytes) => on_line(&*decode_line(&bytes)),
                        None => out_open = false,
                    },
                    line = err.next_segment(), if err_open => match line? {
                        Some(bytes) => on_line(&*decode_line(&bytes)),
                        None => err_open = false,
                    },
                }
            }

            let status = child.wait().await?;
            tracing::debug!(program, code = ?status.code(), "process exited");
            Ok(status.code())
        })
    }
}
