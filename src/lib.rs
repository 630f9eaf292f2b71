// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! # gplflow - GRIDSS/PURPLE/LINX orchestrator
//!
//! `gplflow` drives a batch of tumour/normal pairs through a fixed graph of
//! structural variant tools, one independent flow per pair.
//!
//! ## Features
//!
//! - **Keyed joins** - results for the same pair meet again only when every slot is filled
//! - **Content gates** - pairs with no surviving calls stop early without failing
//! - **Memoization** - unchanged invocations are skipped on re-run
//! - **Failure isolation** - one pair failing never disturbs another
//!
//! ## Quick Start
//!
//! ```bash
//! # Check configuration and inputs
//! gplflow validate --samples samples.yaml
//!
//! # Run every pair
//! gplflow run --samples samples.yaml
//!
//! # See what happened
//! gplflow status
//! ```

pub mod cache;
pub mod cli;
pub mod errors;
pub mod executors;
pub mod gate;
pub mod join;
pub mod model;
pub mod pipeline;
pub mod stages;
pub mod utils;

// Re-export commonly used types
pub use errors::{GplError, GplResult};
pub use model::{Outcome, SampleIdentity};
pub use pipeline::{ExecutionOptions, PipelineExecutor, RunConfig, RunSummary, SampleSheet};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
