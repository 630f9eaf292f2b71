// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Recovery suggestions
//!
//! Turns a failed identity into concrete re-submission steps.

use crate::cache::Fingerprint;
use crate::model::{FailureCause, FailurePoint, SampleIdentity};

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Suggest installing a missing tool
    pub fn install_tool(tool: &str) -> Self {
        Self {
            action: format!("Install {}", tool),
            steps: vec![
                format!("'{}' is invoked by at least one pipeline stage", tool),
                "Install it, or point the matching entry under 'tools' in gplflow.yaml at it".into(),
            ],
            commands: vec![format!("which {}", tool)],
        }
    }

    /// Suggest how to re-submit a failed identity
    pub fn for_failure(
        identity: &SampleIdentity,
        point: &FailurePoint,
        cause: &FailureCause,
        fingerprint: Option<&Fingerprint>,
    ) -> Self {
        let mut steps = vec![format!("{} failed at {}: {}", identity, point, cause)];
        let mut commands = Vec::new();

        match cause {
            FailureCause::InvalidInput { .. } => {
                steps.push("Fix the sample sheet entry, then re-run; nothing was executed".into());
                commands.push("gplflow validate --samples <sheet>".into());
            }
            FailureCause::DuplicateEmission { .. } => {
                steps.push("The identity was supplied more than once; keep a single entry".into());
            }
            FailureCause::NonZeroExit { .. } | FailureCause::SpawnFailed { .. } => {
                if let FailurePoint::Stage { stage } = point {
                    steps.push(format!(
                        "Inspect {}/{}/logs/stderr.log",
                        identity.namespace(),
                        stage
                    ));
                }
            }
            FailureCause::PostConditionViolated { .. } => {
                steps.push("The tool exited cleanly but its output is missing or empty".into());
                steps.push("This is usually disk exhaustion or an out-of-memory kill".into());
            }
            FailureCause::TimedOut { .. } => {
                steps.push("Raise the matching 'resources.timeouts' budget".into());
            }
            FailureCause::GateError { .. } | FailureCause::Internal { .. } => {}
        }

        if let Some(fingerprint) = fingerprint {
            commands.push(format!("gplflow cache invalidate {}", fingerprint));
        }
        commands.push(format!(
            "gplflow run --tumour-name {} --normal-name {} ...",
            identity.tumour_name(),
            identity.normal_name()
        ));

        Self {
            action: format!("Re-submit {}", identity),
            steps,
            commands,
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
