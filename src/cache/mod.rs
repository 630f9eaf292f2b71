// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Memoization of stage invocations
//!
//! Entries are keyed by fingerprint. An entry is only usable while every
//! output it records is still present.

mod filesystem;
mod hash;

pub use filesystem::FilesystemCache;
pub use hash::{current_size, summarize, ContentHasher, Fingerprint};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::errors::GplError;
use crate::model::SampleIdentity;
use crate::stages::{StageKind, StageOutput};

/// Trait for cache implementations
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get the entry for a fingerprint, dropping it if its outputs are gone
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CachedEntry>, GplError>;

    /// Store an entry unless one already exists; returns whether it was written
    async fn store(&self, entry: &CachedEntry) -> Result<bool, GplError>;

    /// Remove one entry; returns whether it existed
    async fn invalidate(&self, fingerprint: &Fingerprint) -> Result<bool, GplError>;

    /// Clear all cached results
    async fn clear(&self) -> Result<(), GplError>;

    /// Get cache statistics
    async fn stats(&self) -> Result<CacheStats, GplError>;

    /// All readable entries
    async fn entries(&self) -> Result<Vec<CachedEntry>, GplError>;
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached entries
    pub entries: usize,
    /// Total size of the cache directory in bytes
    pub size_bytes: u64,
    /// Oldest entry timestamp
    pub oldest_entry: Option<SystemTime>,
    /// Newest entry timestamp
    pub newest_entry: Option<SystemTime>,
}

impl CacheStats {
    /// Format size for display
    pub fn formatted_size(&self) -> String {
        format_bytes(self.size_bytes)
    }
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// A memoized stage invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    /// When the entry was cached
    pub timestamp: SystemTime,
    pub identity: SampleIdentity,
    pub stage: StageKind,
    pub fingerprint: Fingerprint,
    /// Outputs with the summaries recorded when they were produced
    pub outputs: StageOutput,
    pub duration_ms: u64,
}
