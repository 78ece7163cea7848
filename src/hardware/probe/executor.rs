//! Host command execution
//!
//! Runs external tools (lsblk, blkid, LVM) through `tokio::process` with a
//! per-command timeout.

use crate::domain::ports::{CommandOutput, Executor};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Executor backed by `tokio::process::Command`
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl CommandExecutor {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let command_line = render_args(program, args);
        debug!(command = %command_line, "Running command");

        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| Error::CommandFailed {
                command: command_line.clone(),
                reason: format!("timed out after {:?}", self.timeout),
            })?
            .map_err(|e| Error::CommandFailed {
                command: command_line.clone(),
                reason: e.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a command and return its stdout, failing on a non-zero exit
pub async fn run_checked(executor: &dyn Executor, program: &str, args: &[&str]) -> Result<String> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let output = executor.run(program, &args).await?;
    if !output.success() {
        let command = render_args(program, &args);
        warn!(command = %command, code = ?output.code, "Command exited with failure");
        return Err(Error::CommandFailed {
            command,
            reason: output.stderr.trim().to_string(),
        });
    }
    Ok(output.stdout)
}

pub fn render_args(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MockExecutor;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_run_checked_reports_stderr() {
        let mut executor = MockExecutor::new();
        executor.expect_run().returning(|_, _| {
            Ok(CommandOutput {
                code: Some(5),
                stdout: String::new(),
                stderr: "  Volume group \"vg0\" not found\n".into(),
            })
        });

        let err = run_checked(&executor, "vgs", &["vg0"]).await.unwrap_err();
        assert_matches!(
            err,
            Error::CommandFailed { ref command, ref reason }
                if command == "vgs vg0" && reason == "Volume group \"vg0\" not found"
        );
    }

    #[tokio::test]
    async fn test_command_executor_runs_program() {
        let executor = CommandExecutor::default();
        let output = executor
            .run("sh", &["-c".to_string(), "echo hello".to_string()])
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }
}
