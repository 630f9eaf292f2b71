// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Core data model
//!
//! Identities, artifact handles, stage invocations and terminal outcomes.

mod artifact;
mod identity;
mod invocation;
mod outcome;

pub use artifact::{ArtifactKind, ArtifactRef, ArtifactSummary, NO_FILE};
pub use identity::SampleIdentity;
pub use invocation::{InvocationStatus, StageInvocation};
pub use outcome::{FailureCause, FailurePoint, Outcome, StatusRecord};
