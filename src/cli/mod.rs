// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for gplflow.

pub mod cache;
pub mod graph;
pub mod run;
pub mod status;
pub mod validate;

use clap::{Args, Parser, Subcommand};
use miette::Result;
use std::path::{Path, PathBuf};

use crate::pipeline::{RunConfig, SampleEntry, SampleSheet};

/// Configuration file looked up in the working directory when `-c` is not given
pub const DEFAULT_CONFIG_FILE: &str = "gplflow.yaml";

/// Tumour/normal structural variant pipeline orchestrator
///
/// Drives GRIDSS, PURPLE and LINX over a batch of tumour/normal pairs.
#[derive(Parser, Debug)]
#[clap(
    name = "gplflow",
    version,
    about = "Orchestrate the GRIDSS/PURPLE/LINX pipeline over tumour/normal pairs",
    long_about = None,
    after_help = "Examples:\n\
        gplflow run --samples samples.yaml      Run every pair in a sheet\n\
        gplflow run --dry-run --samples s.yaml  Show the commands without running them\n\
        gplflow graph --format dot              Print the stage graph\n\
        gplflow status                          Summarize the latest outcomes\n\n\
        See 'gplflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Run configuration (YAML, or TOML by extension)
    #[clap(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline over one or more tumour/normal pairs
    Run {
        #[clap(flatten)]
        samples: SampleArgs,

        /// Skip cache lookups and stores (force re-execution)
        #[clap(long)]
        no_cache: bool,

        /// Dry run (show what would be done)
        #[clap(long)]
        dry_run: bool,
    },

    /// Validate the configuration and, optionally, a sample sheet
    Validate {
        /// Sample sheet to check
        #[clap(short, long)]
        samples: Option<PathBuf>,
    },

    /// Cache management
    Cache {
        #[clap(subcommand)]
        action: CacheAction,
    },

    /// Show the stage graph
    Graph {
        /// Output format
        #[clap(short, long, default_value = "text", value_parser = clap::builder::TypedValueParser::map(clap::builder::PossibleValuesParser::new(["text", "dot", "mermaid"]), |s: String| s.parse::<GraphFormat>().unwrap()))]
        format: GraphFormat,
    },

    /// Summarize the latest outcome per identity
    Status,
}

/// Where the pairs for a run come from
#[derive(Args, Debug, Clone, Default)]
pub struct SampleArgs {
    /// Sample sheet (YAML list of pairs)
    #[clap(short, long, conflicts_with_all = ["tumour_name", "normal_name", "tumour_bam", "normal_bam"])]
    pub samples: Option<PathBuf>,

    #[clap(long, requires_all = ["normal_name", "tumour_bam", "normal_bam"])]
    pub tumour_name: Option<String>,

    #[clap(long)]
    pub normal_name: Option<String>,

    #[clap(long)]
    pub tumour_bam: Option<PathBuf>,

    #[clap(long)]
    pub normal_bam: Option<PathBuf>,

    /// Somatic small variant VCF (optional)
    #[clap(long)]
    pub tumour_smlv_vcf: Option<PathBuf>,

    /// Pre-computed structural variant VCF to merge with GRIDSS calls (optional)
    #[clap(long)]
    pub tumour_sv_vcf: Option<PathBuf>,
}

impl SampleArgs {
    /// Build the sheet, resolving relative paths against `base`
    pub fn into_sheet(self, base: &Path) -> Result<SampleSheet> {
        if let Some(path) = self.samples {
            return Ok(SampleSheet::from_file(&base.join(path))?);
        }

        match (self.tumour_name, self.normal_name, self.tumour_bam, self.normal_bam) {
            (Some(tumour_name), Some(normal_name), Some(tumour_bam), Some(normal_bam)) => {
                let mut entry = SampleEntry {
                    tumour_name,
                    normal_name,
                    tumour_bam,
                    normal_bam,
                    tumour_smlv_vcf: self.tumour_smlv_vcf,
                    tumour_sv_vcf: self.tumour_sv_vcf,
                };
                entry.absolutize(base);
                Ok(SampleSheet::single(entry))
            }
            _ => Err(miette::miette!(
                "No samples given\n\n\
                 Pass --samples <sheet.yaml>, or --tumour-name, --normal-name, \
                 --tumour-bam and --normal-bam for a single pair."
            )),
        }
    }
}

/// Load the run configuration with every path made absolute
///
/// Without `-c`, `gplflow.yaml` in the working directory is used when
/// present and built-in defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    let cwd = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;

    let mut config = match path {
        Some(path) => RunConfig::from_file(&cwd.join(path))?,
        None => {
            let default = cwd.join(DEFAULT_CONFIG_FILE);
            if default.exists() {
                RunConfig::from_file(&default)?
            } else {
                RunConfig::default()
            }
        }
    };
    config.absolutize(&cwd);
    Ok(config)
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}

/// Cache management actions
#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// Show cache statistics
    Stats,

    /// Clear the cache
    Clear {
        /// Skip confirmation
        #[clap(short, long)]
        yes: bool,
    },

    /// List cached entries
    List,

    /// Drop one entry so its stage runs again
    Invalidate {
        /// Fingerprint, as printed by a failed run or `cache list`
        fingerprint: String,
    },
}
