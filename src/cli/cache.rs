// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Cache command - inspect and prune memoized stage results

use colored::Colorize;
use miette::Result;
use std::io::{self, Write};
use std::path::Path;

use super::CacheAction;
use crate::cache::{Cache, FilesystemCache, Fingerprint};

/// Run the cache command
pub async fn run(config_path: Option<&Path>, action: CacheAction, verbose: bool) -> Result<()> {
    let config = super::load_config(config_path)?;
    let cache_dir = config.cache.directory;
    let cache = FilesystemCache::new(cache_dir.clone())?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats().await?;

            println!("{}", "Cache Statistics".bold());
            println!("{}", "═".repeat(40));
            println!("  Location: {}", cache_dir.display());
            println!("  Entries:  {}", stats.entries);
            println!("  Size:     {}", stats.formatted_size());

            if let Some(oldest) = stats.oldest_entry {
                if let Ok(duration) = oldest.elapsed() {
                    println!("  Oldest:   {} ago", format_duration(duration));
                }
            }

            if let Some(newest) = stats.newest_entry {
                if let Ok(duration) = newest.elapsed() {
                    println!("  Newest:   {} ago", format_duration(duration));
                }
            }

            Ok(())
        }

        CacheAction::Clear { yes } => {
            let stats = cache.stats().await?;

            if stats.entries == 0 {
                println!("{}", "Cache is already empty.".dimmed());
                return Ok(());
            }

            if !yes {
                print!(
                    "Clear {} cache entries ({})? [y/N] ",
                    stats.entries,
                    stats.formatted_size()
                );
                io::stdout().flush().ok();

                let mut input = String::new();
                io::stdin().read_line(&mut input).ok();

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("{}", "Cancelled.".dimmed());
                    return Ok(());
                }
            }

            cache.clear().await?;
            println!("{}", "Cache cleared.".green());

            Ok(())
        }

        CacheAction::List => {
            let entries = cache.entries().await?;

            println!("{}", "Cached Entries".bold());
            println!("{}", "═".repeat(40));

            if entries.is_empty() {
                println!("{}", "  No cached entries.".dimmed());
                return Ok(());
            }

            for entry in &entries {
                let fingerprint = if verbose {
                    entry.fingerprint.as_str()
                } else {
                    entry.fingerprint.short()
                };
                let age = entry
                    .timestamp
                    .elapsed()
                    .map(format_duration)
                    .unwrap_or_else(|_| "?".into());
                println!(
                    "  {}  {:<24} {:<16} {}",
                    fingerprint.cyan(),
                    entry.identity.to_string(),
                    entry.stage.to_string(),
                    format!("{} ago", age).dimmed()
                );
            }

            println!();
            println!(
                "{}",
                "  Run 'gplflow cache invalidate <fingerprint>' to force one stage to run again.".dimmed()
            );

            Ok(())
        }

        CacheAction::Invalidate { fingerprint } => {
            let fingerprint = resolve_fingerprint(&cache, &fingerprint).await?;

            if cache.invalidate(&fingerprint).await? {
                println!("{} {}", "Invalidated".green(), fingerprint);
            } else {
                println!("{}", format!("No entry for {}", fingerprint).dimmed());
            }

            Ok(())
        }
    }
}

/// Accept either a full fingerprint or the short prefix printed by `cache list`
async fn resolve_fingerprint(cache: &FilesystemCache, given: &str) -> Result<Fingerprint> {
    let matches: Vec<Fingerprint> = cache
        .entries()
        .await?
        .into_iter()
        .map(|entry| entry.fingerprint)
        .filter(|fp| fp.as_str().starts_with(given))
        .collect();

    match matches.len() {
        1 => Ok(matches.into_iter().next().unwrap_or_else(|| Fingerprint::from_hex(given))),
        0 if !given.is_empty() && given.chars().all(|c| c.is_ascii_hexdigit()) => Ok(Fingerprint::from_hex(given)),
        0 => Err(miette::miette!("'{}' is not a fingerprint", given)),
        n => Err(miette::miette!(
            "Fingerprint prefix '{}' is ambiguous ({} entries match)",
            given,
            n
        )),
    }
}

fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}
