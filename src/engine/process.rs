//! Subprocess runner with a hard deadline and cancellation.
//!
//! Children are spawned with `kill_on_drop(true)`: when the deadline expires
//! or the request is cancelled, the wait future is dropped and tokio kills
//! the process.

use super::{CommandRunner, Invocation, ToolOutput};
use crate::cancel::CancelToken;
use crate::error::ToolError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Longest stderr tail kept on an [`ToolError::Exited`].
const STDERR_TAIL: usize = 2_000;

/// Runs engines as child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancelToken,
    ) -> Result<ToolOutput, ToolError> {
        let program = invocation.program.clone();
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled { program });
        }

        debug!("Running: {}", invocation);
        let start = Instant::now();

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ToolError::NotFound {
                    program: program.clone(),
                    detail: e.to_string(),
                },
                _ => ToolError::Io {
                    program: program.clone(),
                    source: e,
                },
            })?;

        let output = tokio::select! {
            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => match result {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => return Err(ToolError::Io { program, source: e }),
                Err(_) => {
                    warn!("{} exceeded {}s deadline, killed", program, self.timeout.as_secs());
                    return Err(ToolError::TimedOut {
                        program,
                        secs: self.timeout.as_secs(),
                    });
                }
            },
            _ = cancel.cancelled() => {
                debug!("{} cancelled, killed", program);
                return Err(ToolError::Cancelled { program });
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(
            "{} exited with {:?} in {}ms",
            program,
            output.status.code(),
            start.elapsed().as_millis()
        );

        if !output.status.success() {
            return Err(ToolError::Exited {
                program,
                code: output.status.code(),
                stderr: tail(&stderr, STDERR_TAIL),
            });
        }

        Ok(ToolOutput {
            stdout: output.stdout,
            stderr,
        })
    }
}

/// Last `max` bytes of `s`, cut on a char boundary.
fn tail(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    format!("…{}", &s[start..])
}
