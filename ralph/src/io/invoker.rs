//! Agent invocation seam.
//!
//! The [`AgentInvoker`] trait decouples the loop controller from the real
//! agent executable, so the state machine is testable without spawning
//! processes. The agent's reasoning and edits are opaque; only exit status,
//! elapsed time, and captured output are observed.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument, warn};

use crate::io::process::run_captured;

/// Parameters for one agent invocation.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Combined prompt fed to the agent on stdin.
    pub prompt: String,
    /// Working directory for the agent process.
    pub workdir: PathBuf,
    /// Hard deadline; the process is killed when it elapses.
    pub timeout: Duration,
    /// Capture limit per output stream.
    pub output_limit_bytes: usize,
}

/// Observed outcome of one agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub exit_code: Option<i32>,
    /// Exit status was zero and the deadline was not hit.
    pub success: bool,
    pub elapsed_ms: u64,
    /// Captured output (stdout, with stderr appended when present).
    pub output: String,
    pub timed_out: bool,
}

/// Abstraction over the external agent executable.
pub trait AgentInvoker {
    fn invoke(&self, request: &InvokeRequest) -> Result<Invocation>;
}

/// Invoker that spawns the configured agent argv.
pub struct CommandInvoker {
    command: Vec<String>,
}

impl CommandInvoker {
    /// `command` is the agent argv; config validation guarantees it is
    /// non-empty by the time it reaches here.
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl AgentInvoker for CommandInvoker {
    #[instrument(skip_all, fields(program = self.command.first().map(String::as_str).unwrap_or("")))]
    fn invoke(&self, request: &InvokeRequest) -> Result<Invocation> {
        let program = self
            .command
            .first()
            .ok_or_else(|| anyhow!("agent command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(&self.command[1..]).current_dir(&request.workdir);

        info!(program = %program, "invoking agent");
        let run = run_captured(
            cmd,
            request.prompt.as_bytes(),
            request.timeout,
            request.output_limit_bytes,
        )
        .with_context(|| format!("failed to start agent '{program}'"))?;

        if run.timed_out {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "agent killed at iteration timeout"
            );
        } else if !run.status.success() {
            warn!(exit_code = ?run.status.code(), "agent exited non-zero");
        }

        let mut output = String::from_utf8_lossy(&run.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&run.stderr);
        if !stderr.trim().is_empty() {
            output.push_str("\n[stderr]\n");
            output.push_str(&stderr);
        }
        if run.truncated_bytes > 0 {
            output.push_str(&format!("\n[truncated {} bytes]\n", run.truncated_bytes));
        }

        Ok(Invocation {
            exit_code: run.status.code(),
            success: run.status.success() && !run.timed_out,
            elapsed_ms: run.elapsed.as_millis() as u64,
            output,
            timed_out: run.timed_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(temp: &tempfile::TempDir, prompt: &str) -> InvokeRequest {
        InvokeRequest {
            prompt: prompt.to_string(),
            workdir: temp.path().to_path_buf(),
            timeout: Duration::from_secs(5),
            output_limit_bytes: 10_000,
        }
    }

    #[test]
    fn invoke_captures_output_and_status() {
        let temp = tempfile::tempdir().expect("tempdir");
        let invoker = CommandInvoker::new(vec!["cat".to_string()]);

        let invocation = invoker
            .invoke(&request(&temp, "echoed prompt"))
            .expect("invoke");

        assert!(invocation.success);
        assert_eq!(invocation.exit_code, Some(0));
        assert_eq!(invocation.output, "echoed prompt");
        assert!(!invocation.timed_out);
    }

    #[test]
    fn nonzero_exit_is_observed_not_fatal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let invoker = CommandInvoker::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo gave up; exit 3".to_string(),
        ]);

        let invocation = invoker.invoke(&request(&temp, "")).expect("invoke");

        assert!(!invocation.success);
        assert_eq!(invocation.exit_code, Some(3));
        assert!(invocation.output.contains("gave up"));
    }

    #[test]
    fn missing_executable_is_a_start_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let invoker = CommandInvoker::new(vec!["ralph-no-such-agent".to_string()]);

        let err = invoker.invoke(&request(&temp, "")).unwrap_err();
        assert!(err.to_string().contains("failed to start agent"));
    }
}
