// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Content gates
//!
//! A gate looks inside an intermediate VCF and decides whether the identity
//! continues downstream. An empty call set is a legitimate terminal outcome,
//! not a failure; an unreadable one is a failure.

pub mod vcf;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::errors::{GplError, GplResult};
use crate::model::{ArtifactRef, SampleIdentity};

/// Default decompressed-byte budget for a gate scan
pub const DEFAULT_MAX_SCAN_BYTES: u64 = 64 * 1024 * 1024;

/// The gates of the pipeline graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// After GRIPSS: did filtering retain any structural variant?
    FilteredSv,
    /// After PURPLE: is the purity-annotated SV call set non-empty?
    PurpleSv,
}

impl GateKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::FilteredSv => "filtered_sv",
            Self::PurpleSv => "purple_sv",
        }
    }

    /// Human-readable reason for a halt at this gate
    pub fn halt_reason(self) -> &'static str {
        match self {
            Self::FilteredSv => "no structural variants survived filtering",
            Self::PurpleSv => "no structural variants in the purity-adjusted call set",
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of evaluating a gate for one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub identity: SampleIdentity,
    pub gate: GateKind,
    pub passed: bool,
}

/// Evaluates "does this VCF contain at least one data record"
#[derive(Debug, Clone, Copy)]
pub struct ContentGate {
    kind: GateKind,
    max_scan_bytes: u64,
}

impl ContentGate {
    pub fn new(kind: GateKind, max_scan_bytes: u64) -> Self {
        Self {
            kind,
            max_scan_bytes,
        }
    }

    pub fn kind(&self) -> GateKind {
        self.kind
    }

    /// Evaluate the gate; performs blocking reads
    pub fn evaluate(&self, identity: &SampleIdentity, artifact: &ArtifactRef) -> GplResult<GateDecision> {
        if artifact.is_absent() {
            return Err(GplError::Gate {
                path: artifact.path().to_path_buf(),
                message: format!("gate '{}' was given the no-file sentinel", self.kind),
            });
        }

        let passed = vcf::has_data_record(artifact.path(), self.max_scan_bytes)?;
        debug!(
            "Gate {} for {}: {}",
            self.kind,
            identity,
            if passed { "pass" } else { "halt" }
        );

        Ok(GateDecision {
            identity: identity.clone(),
            gate: self.kind,
            passed,
        })
    }
}
