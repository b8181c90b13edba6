//! One-shot execution of an external executable.
//!
//! Every external call in a batch goes through [`ExternalTool::run`]: the
//! child gets no stdin, both output streams are captured, and an optional
//! timeout bounds how long a hung tool can hold a worker.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, error};

use crate::error::ToolError;

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code, or -1 when the process was killed by a signal.
    pub code: i32,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Turn an unsuccessful exit into [`ToolError::NonZeroExit`].
    pub fn into_success(self, program: &str) -> Result<Self, ToolError> {
        if self.success {
            Ok(self)
        } else {
            Err(ToolError::NonZeroExit {
                program: program.to_string(),
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// An external executable plus how to run it.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    /// Path to the executable, or a bare name for PATH lookup.
    program: PathBuf,

    /// Upper bound on a single invocation (optional).
    timeout: Option<Duration>,
}

impl ExternalTool {
    /// Create a tool for the given executable path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Set the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Display name used in errors and logs.
    pub fn name(&self) -> String {
        self.program.display().to_string()
    }

    /// Run the tool to completion with the given arguments.
    ///
    /// A non-zero exit is *not* an error here; callers decide what it means.
    pub async fn run<I, S>(&self, args: I) -> Result<ProcessOutput, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Full command: {:?}", cmd);

        let child = cmd.spawn().map_err(|e| {
            error!(program = %self.name(), error = %e, "Failed to spawn tool");
            ToolError::Spawn {
                program: self.name(),
                source: e,
            }
        })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| ToolError::Timeout {
                    program: self.name(),
                    secs: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        let code = output.status.code().unwrap_or(-1);
        debug!(program = %self.name(), exit_code = code, "Tool exited");

        Ok(ProcessOutput {
            code,
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_output_and_status() {
        let tool = ExternalTool::new("sh");
        let out = tool
            .run(["-c", "echo hello; echo oops >&2; exit 3"])
            .await
            .unwrap();

        assert!(!out.success);
        assert_eq!(out.code, 3);
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");

        let err = out.into_success("sh").unwrap_err();
        assert!(matches!(err, ToolError::NonZeroExit { code: 3, .. }));
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let tool = ExternalTool::new("/nonexistent/dockrun-tool");
        let err = tool.run(["x"]).await.unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_hung_tool() {
        let tool = ExternalTool::new("sleep").with_timeout(Some(Duration::from_millis(100)));
        let err = tool.run(["5"]).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }
}
