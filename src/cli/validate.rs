// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Validate command - check configuration, reference data and samples

use colored::Colorize;
use miette::Result;
use std::path::{Path, PathBuf};

use crate::pipeline::{ConfigValidator, SampleSheet};
use crate::utils::create_spinner;

/// Run the validate command
pub async fn run(config_path: Option<&Path>, samples: Option<PathBuf>, verbose: bool) -> Result<()> {
    println!("{}", "Validating configuration...".bold());
    println!();

    let config = match super::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("  {} Failed to load configuration", "✗".red());
            eprintln!();
            return Err(e);
        }
    };
    println!("  {} Configuration parsed", "✓".green());

    let mut validation = ConfigValidator::validate(&config)?;
    let missing_files = ConfigValidator::validate_files(&config);

    let mut sample_failures = Vec::new();
    if let Some(path) = samples {
        let sheet = SampleSheet::from_file(&path)?;
        println!("  {} Sample sheet parsed ({} pairs)", "✓".green(), sheet.len());
        validation.merge(ConfigValidator::validate_samples(&sheet));

        // Admission reads BAM indexes and VCF headers; run it off the async thread
        let max_scan_bytes = config.gate.max_scan_bytes;
        let spinner = create_spinner("Checking sample inputs...");
        sample_failures = tokio::task::spawn_blocking(move || {
            sheet
                .samples
                .iter()
                .filter_map(|entry| entry.admit(max_scan_bytes).err())
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| miette::miette!("Sample check panicked: {}", e))?;
        spinner.finish_and_clear();
    }

    let mut has_issues = false;

    if !validation.errors.is_empty() {
        has_issues = true;
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !sample_failures.is_empty() {
        has_issues = true;
        println!();
        println!("{}:", "Samples that would fail admission".red().bold());
        for failure in &sample_failures {
            println!("  {} {}", "✗".red(), failure);
        }
    }

    if !missing_files.is_empty() {
        has_issues = true;
        println!();
        println!("{}:", "Missing files".yellow().bold());
        for missing in &missing_files {
            println!("  {} {}", "⚠".yellow(), missing);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Effective configuration".bold());
        for line in config.to_yaml()?.lines() {
            println!("  {}", line);
        }
    }

    println!();

    if has_issues {
        if validation.is_valid() && sample_failures.is_empty() {
            println!(
                "{}",
                "Configuration is valid but reference data or tools are missing.".yellow().bold()
            );
            Ok(())
        } else {
            Err(miette::miette!("Validation failed"))
        }
    } else {
        println!("{}", "Configuration is valid!".green().bold());
        Ok(())
    }
}
