// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! gplflow - GRIDSS/PURPLE/LINX orchestrator
//!
//! Drive tumour/normal pairs through the structural variant pipeline.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gplflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gplflow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(gplflow::utils::log_writer),
        )
        .init();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    let config = cli.config.as_deref();

    // Dispatch to command handlers
    match cli.command {
        Commands::Run {
            samples,
            no_cache,
            dry_run,
        } => gplflow::cli::run::run(config, samples, no_cache, dry_run, cli.verbose).await,
        Commands::Validate { samples } => {
            gplflow::cli::validate::run(config, samples, cli.verbose).await
        }
        Commands::Cache { action } => gplflow::cli::cache::run(config, action, cli.verbose).await,
        Commands::Graph { format } => gplflow::cli::graph::run(format, cli.verbose).await,
        Commands::Status => gplflow::cli::status::run(config, cli.verbose).await,
    }
}
