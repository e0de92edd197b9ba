//! Shell subprocess with a line-oriented stdout stream
//!
//! Stderr is inherited, never captured. Stdin is closed. A child whose
//! stream is dropped before `wait` is killed.

use crate::config::ShellConfig;
use crate::error::{ShcacheError, ShcacheResult};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

/// Exit code reported when no real exit status is available
pub const SENTINEL_EXIT_CODE: i32 = -1;

/// Shell used to launch cached commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    program: String,
    args: Vec<String>,
}

impl Shell {
    /// Create a shell from its program and leading arguments
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Start `command` and return its output stream
    pub fn spawn(&self, command: &str) -> ShcacheResult<OutputStream> {
        if command.trim().is_empty() {
            return Err(ShcacheError::EmptyCommand);
        }

        debug!("Executing: {} {:?} {:?}", self.program, self.args, command);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ShcacheError::command_spawn(command, e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ShcacheError::Internal(format!("stdout of `{}` was not piped", command))
        })?;

        Ok(OutputStream {
            command: command.to_string(),
            child,
            stdout: BufReader::new(stdout),
            buf: Vec::new(),
        })
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::from(&ShellConfig::default())
    }
}

impl From<&ShellConfig> for Shell {
    fn from(config: &ShellConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

/// Running command whose stdout is read one line at a time
#[derive(Debug)]
pub struct OutputStream {
    command: String,
    child: Child,
    stdout: BufReader<ChildStdout>,
    buf: Vec<u8>,
}

impl OutputStream {
    /// Next stdout line without its terminator, or `None` at end of stream.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub async fn next_line(&mut self) -> ShcacheResult<Option<String>> {
        self.buf.clear();
        let read = self
            .stdout
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(|e| ShcacheError::CommandOutput {
                command: self.command.clone(),
                source: e,
            })?;

        if read == 0 {
            return Ok(None);
        }
        if self.buf.ends_with(b"\n") {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    /// Wait for the process to exit.
    ///
    /// Termination by signal reports the sentinel exit code.
    pub async fn wait(mut self) -> ShcacheResult<i32> {
        // Close our end first so a writer blocked on a full pipe can finish
        drop(self.stdout);

        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ShcacheError::CommandOutput {
                command: self.command.clone(),
                source: e,
            })?;

        Ok(status.code().unwrap_or(SENTINEL_EXIT_CODE))
    }
}
