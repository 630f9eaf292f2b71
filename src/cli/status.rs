// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Status command - summarize the status log

use colored::Colorize;
use miette::Result;
use std::path::Path;

use crate::model::{Outcome, StatusRecord};
use crate::pipeline::StatusLog;

/// Run the status command
pub async fn run(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let config = super::load_config(config_path)?;
    let log = StatusLog::new(config.status_log_path());

    let latest = log.latest_outcomes()?;
    if latest.is_empty() {
        println!(
            "{}",
            format!("No outcomes recorded in {}", log.path().display()).dimmed()
        );
        return Ok(());
    }

    println!("{}", "Latest outcomes".bold());
    println!("{}", "═".repeat(40));

    let (mut reported, mut halted, mut failed) = (0, 0, 0);
    for (identity, outcome) in &latest {
        let marker = match outcome {
            Outcome::Reported { .. } => {
                reported += 1;
                "✓".green()
            }
            Outcome::HaltedAtGate { .. } => {
                halted += 1;
                "○".yellow()
            }
            Outcome::Failed { .. } => {
                failed += 1;
                "✗".red()
            }
        };
        println!("  {} {:<24} {}", marker, identity.to_string(), outcome);
    }

    if verbose {
        let invocations = log
            .read_records()?
            .into_iter()
            .filter(|record| matches!(record, StatusRecord::Invocation { .. }))
            .count();
        println!();
        println!("  {} invocation records in {}", invocations, log.path().display());
    }

    println!();
    println!(
        "  {} reported, {} halted, {} failed",
        reported.to_string().green(),
        halted.to_string().yellow(),
        failed.to_string().red()
    );

    Ok(())
}
