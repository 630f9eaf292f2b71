// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Tool runners
//!
//! Stages never spawn processes themselves. They render a `ToolCommand` and
//! hand it to a `ToolRunner`, which reports what happened without judging
//! whether the stage succeeded.

mod process;

pub use process::ProcessRunner;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::GplError;

/// Number of stderr lines kept in failure records
const STDERR_TAIL_LINES: usize = 20;

/// A fully rendered external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Executable name or path
    pub program: String,
    pub args: Vec<String>,
    /// Stage-private directory the tool runs in
    pub working_dir: PathBuf,
    /// Extra environment variables
    pub env: BTreeMap<String, String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a flag followed by its value
    pub fn opt(self, flag: &str, value: impl fmt::Display) -> Self {
        self.arg(flag).arg(value.to_string())
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Command line as it would be typed in a shell
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + self.env.len() + 1);
        for (key, value) in &self.env {
            parts.push(format!("{}={}", key, shell_quote(value)));
        }
        parts.push(shell_quote(&self.program));
        parts.extend(self.args.iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// What an external process did
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Exit status was zero
    pub success: bool,

    pub stdout: String,

    pub stderr: String,

    /// Exit code, absent when the process was killed by a signal or timed out
    pub exit_code: Option<i32>,

    pub duration: Duration,

    /// The process exceeded its wall-clock budget and was killed
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Create a successful result
    pub fn success(stdout: String, duration: Duration) -> Self {
        Self {
            success: true,
            stdout,
            stderr: String::new(),
            exit_code: Some(0),
            duration,
            timed_out: false,
        }
    }

    /// Create a failed result
    pub fn failure(stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr,
            exit_code: Some(exit_code),
            duration,
            timed_out: false,
        }
    }

    /// Create a result for a process killed after `duration`
    pub fn timed_out(duration: Duration) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            duration,
            timed_out: true,
        }
    }

    /// Last lines of stderr
    pub fn stderr_tail(&self) -> String {
        let lines: Vec<&str> = self.stderr.lines().collect();
        let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
        lines[start..].join("\n")
    }
}

/// Runs rendered tool commands
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run a command, killing it once `budget` has elapsed
    ///
    /// An `Err` means the process could not be started at all.
    async fn run(&self, command: &ToolCommand, budget: Duration) -> Result<ExecutionResult, GplError>;

    /// Check whether a program can be found
    async fn check_available(&self, program: &str) -> Result<bool, GplError>;
}
