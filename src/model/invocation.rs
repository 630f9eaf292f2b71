// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Stage invocations and their forward-only lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;

use super::SampleIdentity;
use crate::cache::Fingerprint;
use crate::errors::GplError;
use crate::stages::{StageKind, StageOutput};

/// Lifecycle state of one (identity, stage) unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Prior outputs reused from the cache
    Skipped,
    /// Conditionally not run; primary input forwarded unchanged
    Bypassed,
}

impl InvocationStatus {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Skipped | Self::Bypassed
        )
    }

    /// Whether `next` is a legal forward transition from this state
    pub fn can_advance_to(self, next: InvocationStatus) -> bool {
        use InvocationStatus::*;

        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Skipped)
                | (Pending, Bypassed)
                | (Pending, Failed)
                | (Running, Succeeded)
                | (Running, Failed)
        )
    }
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped (cached)",
            Self::Bypassed => "bypassed",
        };
        write!(f, "{}", name)
    }
}

/// One execution (or reuse, or bypass) of a stage for an identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageInvocation {
    pub identity: SampleIdentity,
    pub stage: StageKind,
    /// Memoization key, known once inputs are resolved
    pub fingerprint: Option<Fingerprint>,
    status: InvocationStatus,
    /// Outputs, present once the invocation succeeded, was skipped or bypassed
    pub outputs: Option<StageOutput>,
    /// Wall-clock time spent in the external process
    pub duration_ms: u64,
}

impl StageInvocation {
    /// Create a pending invocation
    pub fn new(identity: SampleIdentity, stage: StageKind) -> Self {
        Self {
            identity,
            stage,
            fingerprint: None,
            status: InvocationStatus::Pending,
            outputs: None,
            duration_ms: 0,
        }
    }

    pub fn status(&self) -> InvocationStatus {
        self.status
    }

    /// Move to the next state, rejecting backward or post-terminal transitions
    pub fn advance(&mut self, next: InvocationStatus) -> Result<(), GplError> {
        if !self.status.can_advance_to(next) {
            return Err(GplError::InvalidTransition {
                stage: self.stage.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Whether the external process was actually launched
    pub fn executed(&self) -> bool {
        matches!(
            self.status,
            InvocationStatus::Running | InvocationStatus::Succeeded
        ) || (self.status == InvocationStatus::Failed && self.duration_ms > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> SampleIdentity {
        SampleIdentity::new("tumour", "normal").unwrap()
    }

    #[test]
    fn test_forward_transitions() {
        let mut invocation = StageInvocation::new(identity(), StageKind::Amber);
        invocation.advance(InvocationStatus::Running).unwrap();
        invocation.advance(InvocationStatus::Succeeded).unwrap();
        assert!(invocation.status().is_terminal());
    }

    #[test]
    fn test_no_transition_out_of_terminal_state() {
        let mut invocation = StageInvocation::new(identity(), StageKind::Amber);
        invocation.advance(InvocationStatus::Skipped).unwrap();

        assert!(invocation.advance(InvocationStatus::Running).is_err());
        assert!(invocation.advance(InvocationStatus::Pending).is_err());
        assert_eq!(invocation.status(), InvocationStatus::Skipped);
    }

    #[test]
    fn test_running_cannot_be_skipped() {
        let mut invocation = StageInvocation::new(identity(), StageKind::Cobalt);
        invocation.advance(InvocationStatus::Running).unwrap();
        assert!(invocation.advance(InvocationStatus::Skipped).is_err());
        assert!(invocation.advance(InvocationStatus::Bypassed).is_err());
    }
}
