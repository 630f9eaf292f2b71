// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Run command - drive every pair through the pipeline

use colored::Colorize;
use miette::Result;
use std::path::Path;
use std::sync::Arc;

use super::SampleArgs;
use crate::cache::FilesystemCache;
use crate::errors::{GplError, RecoverySuggestion};
use crate::executors::ProcessRunner;
use crate::model::{InvocationStatus, Outcome};
use crate::pipeline::{ConfigValidator, ExecutionOptions, PipelineExecutor, RunEvent, RunSummary};
use crate::utils::{create_progress_bar, route_logs_around};

/// Run the pipeline
pub async fn run(
    config_path: Option<&Path>,
    samples: SampleArgs,
    no_cache: bool,
    dry_run: bool,
    verbose: bool,
) -> Result<()> {
    let config = super::load_config(config_path)?;

    let validation = ConfigValidator::validate(&config)?;
    if !validation.is_valid() {
        eprintln!("{}", "Configuration validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(GplError::InvalidConfig {
            reason: format!("{} problem(s) found", validation.errors.len()),
            help: Some("Run 'gplflow validate' for details".into()),
        }
        .into());
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Configuration warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    let cwd = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;
    let sheet = samples.into_sheet(&cwd)?;

    if sheet.is_empty() {
        return Err(miette::miette!("Sample sheet has no entries"));
    }
    // Bad entries fail on their own at admission; the rest of the sheet still runs
    let sample_check = ConfigValidator::validate_samples(&sheet);
    for problem in sample_check.errors.iter().chain(&sample_check.warnings) {
        eprintln!("  {} {}", "⚠".yellow(), problem);
    }

    let cache_enabled = config.cache.enabled;
    let cache_dir = config.cache.directory.clone();
    let mut executor = PipelineExecutor::new(config, Arc::new(ProcessRunner::new()))?;

    if !dry_run {
        let missing_tools = executor.check_tools().await?;
        if !missing_tools.is_empty() {
            eprintln!("{}", "Missing required tools:".red().bold());
            for tool in &missing_tools {
                eprintln!("  {} {}", "✗".red(), tool);
            }
            eprintln!();
            eprintln!("{}", RecoverySuggestion::install_tool(&missing_tools[0]));
            return Err(miette::miette!("Required tools are not installed"));
        }
    }

    if cache_enabled && !no_cache && !dry_run {
        executor = executor.with_cache(Box::new(FilesystemCache::new(cache_dir)?));
    }

    let progress = create_progress_bar(sheet.len() as u64, "Samples");
    if dry_run {
        progress.finish_and_clear();
    }
    let events = progress.clone();
    let executor = executor.on_event(move |event| match event {
        RunEvent::Invocation {
            identity,
            stage,
            status,
        } if verbose => {
            events.println(format!("  {} {} {}", identity, stage, status_label(*status)));
        }
        RunEvent::Finished { .. } => events.inc(1),
        _ => {}
    });

    let options = ExecutionOptions { no_cache, dry_run };
    let routing = route_logs_around(&progress);
    let summary = executor.run(&sheet, &options).await;
    drop(routing);
    progress.finish_and_clear();
    let summary = summary?;

    if let Some(plan) = &summary.plan {
        println!("{}", "Planned commands".bold());
        println!("{}", "═".repeat(40));
        println!("{}", plan);
        return Ok(());
    }

    print_summary(&summary, verbose);

    if summary.success() {
        Ok(())
    } else {
        Err(miette::miette!(
            "{} of {} samples failed",
            summary.failed() + summary.rejected.len(),
            sheet.len()
        ))
    }
}

fn status_label(status: InvocationStatus) -> colored::ColoredString {
    let label = status.to_string();
    match status {
        InvocationStatus::Succeeded => label.green(),
        InvocationStatus::Skipped | InvocationStatus::Bypassed => label.dimmed(),
        InvocationStatus::Failed => label.red(),
        _ => label.normal(),
    }
}

fn print_summary(summary: &RunSummary, verbose: bool) {
    println!();
    println!("{}", "Run summary".bold());
    println!("{}", "═".repeat(40));

    for report in &summary.identities {
        match &report.outcome {
            Outcome::Reported { report: html } => {
                println!("  {} {} {}", "✓".green(), report.identity, html.to_string().dimmed());
            }
            Outcome::HaltedAtGate { gate } => {
                println!(
                    "  {} {} {}",
                    "○".yellow(),
                    report.identity,
                    format!("no calls survived gate '{}'", gate).dimmed()
                );
            }
            outcome @ Outcome::Failed { .. } => {
                println!("  {} {} {}", "✗".red(), report.identity, outcome);
            }
        }

        if verbose {
            for invocation in &report.invocations {
                println!("      {} {}", invocation.stage, status_label(invocation.status()));
            }
        }
    }

    for rejected in &summary.rejected {
        println!("  {} {} {}", "✗".red(), rejected.name, rejected.reason.dimmed());
    }

    println!();
    println!(
        "  {} reported, {} halted, {} failed; {} tool runs in {:.1}s",
        summary.reported().to_string().green(),
        summary.halted().to_string().yellow(),
        (summary.failed() + summary.rejected.len()).to_string().red(),
        summary.launched,
        summary.duration.as_secs_f64()
    );

    let suggestions: Vec<_> = summary.identities.iter().filter_map(|r| r.recovery()).collect();
    if !suggestions.is_empty() {
        println!();
        println!("{}", "Recovery".bold());
        for suggestion in suggestions {
            println!("{}", suggestion);
        }
    }
}
