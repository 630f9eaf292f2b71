// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! The sample pipeline
//!
//! Run configuration, the fixed stage graph, sample admission and the
//! orchestrator that drives identities through the graph.

mod definition;
mod executor;
mod graph;
pub mod samples;
mod stage_executor;
pub mod status;
mod validation;

pub use definition::*;
pub use executor::{
    dry_run_plan, ExecutionOptions, IdentityReport, PipelineExecutor, RejectedSample, RunEvent, RunSummary,
};
pub use graph::{Node, PipelineGraph, Port};
pub use samples::{AdmittedSample, SampleEntry, SampleSheet};
pub use stage_executor::{StageExecutor, StageFailure};
pub use status::StatusLog;
pub use validation::{ConfigValidator, ValidationResult, MAX_JVM_HEAP_GB};
