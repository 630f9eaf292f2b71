// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Terminal outcomes and status records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

use super::{ArtifactRef, InvocationStatus, SampleIdentity};
use crate::cache::Fingerprint;
use crate::gate::GateKind;
use crate::join::JoinTarget;
use crate::stages::StageKind;

/// Where in the graph an identity failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailurePoint {
    /// Rejected before entering the graph
    Admission,
    Join { target: JoinTarget },
    Stage { stage: StageKind },
    Gate { gate: GateKind },
}

impl fmt::Display for FailurePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admission => write!(f, "admission"),
            Self::Join { target } => write!(f, "join '{}'", target),
            Self::Stage { stage } => write!(f, "stage '{}'", stage),
            Self::Gate { gate } => write!(f, "gate '{}'", gate),
        }
    }
}

/// Why an identity failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    InvalidInput { message: String },
    /// A producer supplied the same join slot twice
    DuplicateEmission { slot: String },
    SpawnFailed { message: String },
    NonZeroExit { code: i32, stderr_tail: String },
    /// The tool exited zero but its declared output is missing or empty
    PostConditionViolated { condition: String },
    TimedOut { after_secs: u64 },
    GateError { message: String },
    Internal { message: String },
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { message } => write!(f, "invalid input: {}", message),
            Self::DuplicateEmission { slot } => {
                write!(f, "duplicate emission into slot '{}'", slot)
            }
            Self::SpawnFailed { message } => write!(f, "could not start tool: {}", message),
            Self::NonZeroExit { code, stderr_tail } => {
                if stderr_tail.is_empty() {
                    write!(f, "exited with code {}", code)
                } else {
                    write!(f, "exited with code {}: {}", code, stderr_tail)
                }
            }
            Self::PostConditionViolated { condition } => {
                write!(f, "post-condition violated: {}", condition)
            }
            Self::TimedOut { after_secs } => write!(f, "timed out after {}s", after_secs),
            Self::GateError { message } => write!(f, "gate evaluation failed: {}", message),
            Self::Internal { message } => write!(f, "internal error: {}", message),
        }
    }
}

/// Terminal outcome of one admitted identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Reported {
        report: ArtifactRef,
    },
    HaltedAtGate {
        gate: GateKind,
    },
    Failed {
        point: FailurePoint,
        cause: FailureCause,
        fingerprint: Option<Fingerprint>,
    },
}

impl Outcome {
    pub fn is_reported(&self) -> bool {
        matches!(self, Self::Reported { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Short label used in status output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reported { .. } => "reported",
            Self::HaltedAtGate { .. } => "halted",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reported { report } => write!(f, "reported ({})", report),
            Self::HaltedAtGate { gate } => write!(f, "halted at gate '{}'", gate),
            Self::Failed { point, cause, .. } => write!(f, "failed at {}: {}", point, cause),
        }
    }
}

/// One line of `status.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum StatusRecord {
    /// A finished stage invocation
    Invocation {
        timestamp: SystemTime,
        identity: SampleIdentity,
        stage: StageKind,
        status: InvocationStatus,
        fingerprint: Option<Fingerprint>,
        duration_ms: u64,
    },
    /// The terminal outcome of an identity
    Outcome {
        timestamp: SystemTime,
        identity: SampleIdentity,
        #[serde(flatten)]
        outcome: Outcome,
    },
}

impl StatusRecord {
    pub fn identity(&self) -> &SampleIdentity {
        match self {
            Self::Invocation { identity, .. } | Self::Outcome { identity, .. } => identity,
        }
    }
}
