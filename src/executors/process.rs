// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Process runner
//!
//! Spawns tools with tokio, captures their output into the stage's `logs/`
//! directory and kills them when their budget runs out. Each tool leads its
//! own process group so a timeout also reaches the helpers it forked.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ExecutionResult, ToolCommand, ToolRunner};
use crate::errors::GplError;

/// Runs tools as local child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    async fn write_log(dir: &Path, name: &str, content: &str) -> Result<(), GplError> {
        let path = dir.join(name);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| GplError::write_failed(&path, e))
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand, budget: Duration) -> Result<ExecutionResult, GplError> {
        let log_dir = command.working_dir.join("logs");
        tokio::fs::create_dir_all(&log_dir)
            .await
            .map_err(|e| GplError::write_failed(&log_dir, e))?;

        let rendered = command.render();
        Self::write_log(&log_dir, "command.txt", &format!("{}\n", rendered)).await?;
        debug!("Running: {}", rendered);

        let start = Instant::now();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| GplError::ToolExecutionFailed {
                tool: command.program.clone(),
                error: e.to_string(),
                help: Some(format!(
                    "Check that '{}' is installed and executable",
                    command.program
                )),
            })?;

        let pid = child.id();

        // Dropping the future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(output) => output.map_err(|e| GplError::ToolExecutionFailed {
                tool: command.program.clone(),
                error: e.to_string(),
                help: None,
            })?,
            Err(_) => {
                warn!(
                    "'{}' exceeded its {}s budget and was killed",
                    command.program,
                    budget.as_secs()
                );
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                let result = ExecutionResult::timed_out(start.elapsed());
                Self::write_log(
                    &log_dir,
                    "stderr.log",
                    &format!("killed after {}s\n", budget.as_secs()),
                )
                .await?;
                return Ok(result);
            }
        };

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        Self::write_log(&log_dir, "stdout.log", &stdout).await?;
        Self::write_log(&log_dir, "stderr.log", &stderr).await?;

        Ok(ExecutionResult {
            success: output.status.success(),
            stdout,
            stderr,
            exit_code: output.status.code(),
            duration,
            timed_out: false,
        })
    }

    async fn check_available(&self, program: &str) -> Result<bool, GplError> {
        Ok(which::which(program).is_ok())
    }
}

/// Sends SIGKILL to every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    // The group id equals the leader's pid because of `process_group(0)`
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(
            "killpg({}) failed: {}",
            pid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_captures_output_and_logs() {
        let temp_dir = TempDir::new().unwrap();
        let command = ToolCommand::new("sh", temp_dir.path())
            .arg("-c")
            .arg("echo hello; echo oops >&2");

        let result = ProcessRunner::new()
            .run(&command, Duration::from_secs(30))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.stdout.contains("hello"));

        let logs = temp_dir.path().join("logs");
        assert!(logs.join("command.txt").is_file());
        let stderr = std::fs::read_to_string(logs.join("stderr.log")).unwrap();
        assert!(stderr.contains("oops"));
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let temp_dir = TempDir::new().unwrap();
        let command = ToolCommand::new("sh", temp_dir.path()).arg("-c").arg("exit 3");

        let result = ProcessRunner::new()
            .run(&command, Duration::from_secs(30))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let temp_dir = TempDir::new().unwrap();
        let command = ToolCommand::new("sleep", temp_dir.path()).arg("10");

        let result = ProcessRunner::new()
            .run(&command, Duration::from_millis(100))
            .await
            .unwrap();

        assert!(result.timed_out);
        assert!(!result.success);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_forked_helpers() {
        let temp_dir = TempDir::new().unwrap();
        let command = ToolCommand::new("sh", temp_dir.path())
            .arg("-c")
            .arg("(sleep 1; echo alive > late.txt) & wait");

        let result = ProcessRunner::new()
            .run(&command, Duration::from_millis(200))
            .await
            .unwrap();
        assert!(result.timed_out);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!temp_dir.path().join("late.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let temp_dir = TempDir::new().unwrap();
        let command = ToolCommand::new("gplflow-no-such-tool", temp_dir.path());

        let result = ProcessRunner::new().run(&command, Duration::from_secs(5)).await;
        assert!(result.is_err());
    }
}
