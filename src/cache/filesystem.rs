// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Filesystem-based cache implementation
//!
//! Stores one JSON file per fingerprint under a two-character prefix
//! directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{current_size, Cache, CacheStats, CachedEntry, Fingerprint};
use crate::errors::GplError;

/// Filesystem-based cache
pub struct FilesystemCache {
    /// Cache directory
    cache_dir: PathBuf,
}

impl FilesystemCache {
    /// Create a new filesystem cache
    pub fn new(cache_dir: PathBuf) -> Result<Self, GplError> {
        if !cache_dir.exists() {
            std::fs::create_dir_all(&cache_dir).map_err(|e| GplError::CacheError {
                message: format!("Failed to create cache directory: {}", e),
            })?;
        }

        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get path for a cache entry
    fn cache_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        let key = fingerprint.as_str();
        let (prefix, rest) = key.split_at(2.min(key.len()));
        self.cache_dir.join(prefix).join(format!("{}.json", rest))
    }

    /// Whether every recorded output is still present with its recorded size
    fn outputs_intact(entry: &CachedEntry) -> bool {
        entry.outputs.artifacts().into_iter().all(|artifact| {
            if artifact.is_absent() {
                return true;
            }
            match (current_size(artifact), artifact.summary()) {
                (Some(size), Some(summary)) => size == summary.size_bytes,
                (Some(_), None) => true,
                (None, _) => false,
            }
        })
    }

    /// Read every parseable entry file
    fn list_entries(&self) -> Result<Vec<CachedEntry>, GplError> {
        let mut entries = Vec::new();

        if !self.cache_dir.exists() {
            return Ok(entries);
        }

        let read_dir = |dir: &Path| {
            std::fs::read_dir(dir).map_err(|e| GplError::CacheError {
                message: format!("Failed to read cache directory '{}': {}", dir.display(), e),
            })
        };

        for prefix_dir in read_dir(&self.cache_dir)? {
            let prefix_dir = prefix_dir?.path();
            if !prefix_dir.is_dir() {
                continue;
            }

            for entry_file in read_dir(&prefix_dir)? {
                let entry_file = entry_file?.path();
                if entry_file.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }

                // Unreadable entries are skipped rather than failing the listing
                if let Ok(content) = std::fs::read_to_string(&entry_file) {
                    if let Ok(entry) = serde_json::from_str::<CachedEntry>(&content) {
                        entries.push(entry);
                    }
                }
            }
        }

        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }

    /// Calculate directory size recursively
    fn dir_size(path: &Path) -> Result<u64, GplError> {
        let mut size = 0;

        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                size += Self::dir_size(&path)?;
            } else {
                size += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }

        Ok(size)
    }
}

#[async_trait]
impl Cache for FilesystemCache {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CachedEntry>, GplError> {
        let path = self.cache_path(fingerprint);

        if !path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| GplError::CacheError {
                message: format!("Failed to read cache entry: {}", e),
            })?;

        let entry: CachedEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Dropping unreadable cache entry {}: {}", fingerprint.short(), e);
                let _ = tokio::fs::remove_file(&path).await;
                return Ok(None);
            }
        };

        let check = entry.clone();
        let intact = tokio::task::spawn_blocking(move || Self::outputs_intact(&check)).await?;

        if !intact {
            debug!(
                "Cache entry {} for {}/{} is stale: outputs missing or changed",
                fingerprint.short(),
                entry.identity,
                entry.stage
            );
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn store(&self, entry: &CachedEntry) -> Result<bool, GplError> {
        let path = self.cache_path(&entry.fingerprint);

        if path.exists() {
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GplError::CacheError {
                    message: format!("Failed to create cache directory: {}", e),
                })?;
        }

        let json = serde_json::to_string_pretty(entry).map_err(|e| GplError::CacheError {
            message: format!("Failed to serialize cache entry: {}", e),
        })?;

        // Write then rename so readers never see a partial entry
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| GplError::CacheError {
                message: format!("Failed to write cache entry: {}", e),
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| GplError::CacheError {
                message: format!("Failed to write cache entry: {}", e),
            })?;

        Ok(true)
    }

    async fn invalidate(&self, fingerprint: &Fingerprint) -> Result<bool, GplError> {
        let path = self.cache_path(fingerprint);

        if !path.exists() {
            return Ok(false);
        }

        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| GplError::CacheError {
                message: format!("Failed to remove cache entry: {}", e),
            })?;

        Ok(true)
    }

    async fn clear(&self) -> Result<(), GplError> {
        if self.cache_dir.exists() {
            tokio::fs::remove_dir_all(&self.cache_dir)
                .await
                .map_err(|e| GplError::CacheError {
                    message: format!("Failed to clear cache: {}", e),
                })?;

            tokio::fs::create_dir_all(&self.cache_dir)
                .await
                .map_err(|e| GplError::CacheError {
                    message: format!("Failed to recreate cache directory: {}", e),
                })?;
        }

        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, GplError> {
        let entries = self.list_entries()?;

        let mut stats = CacheStats {
            entries: entries.len(),
            size_bytes: 0,
            oldest_entry: entries.iter().map(|e| e.timestamp).min(),
            newest_entry: entries.iter().map(|e| e.timestamp).max(),
        };

        if self.cache_dir.exists() {
            stats.size_bytes = Self::dir_size(&self.cache_dir)?;
        }

        Ok(stats)
    }

    async fn entries(&self) -> Result<Vec<CachedEntry>, GplError> {
        self.list_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::summarize;
    use crate::model::{ArtifactRef, SampleIdentity};
    use crate::pipeline::CacheInvalidation;
    use crate::stages::{StageKind, StageOutput};
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn make_entry(output: &Path, fingerprint: &str) -> CachedEntry {
        let artifact = ArtifactRef::file(output);
        let summary = summarize(&artifact, CacheInvalidation::ContentHash).unwrap();

        CachedEntry {
            timestamp: SystemTime::now(),
            identity: SampleIdentity::new("T1", "N1").unwrap(),
            stage: StageKind::Gridss,
            fingerprint: Fingerprint::from_hex(fingerprint),
            outputs: StageOutput::SvCalls {
                vcf: artifact.with_summary(summary),
            },
            duration_ms: 100,
        }
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FilesystemCache::new(temp_dir.path().join("cache")).unwrap();
        let output = temp_dir.path().join("T1.gridss.vcf.gz");
        std::fs::write(&output, "calls").unwrap();

        let entry = make_entry(&output, "abcdef0123");
        assert!(cache.store(&entry).await.unwrap());

        let cached = cache.get(&entry.fingerprint).await.unwrap().unwrap();
        assert_eq!(cached.outputs, entry.outputs);
        assert_eq!(cached.stage, StageKind::Gridss);
    }

    #[tokio::test]
    async fn test_store_is_insert_if_absent() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FilesystemCache::new(temp_dir.path().join("cache")).unwrap();
        let output = temp_dir.path().join("T1.gridss.vcf.gz");
        std::fs::write(&output, "calls").unwrap();

        let entry = make_entry(&output, "abcdef0123");
        assert!(cache.store(&entry).await.unwrap());
        assert!(!cache.store(&entry).await.unwrap());
        assert_eq!(cache.stats().await.unwrap().entries, 1);
    }

    #[tokio::test]
    async fn test_missing_output_drops_entry() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FilesystemCache::new(temp_dir.path().join("cache")).unwrap();
        let output = temp_dir.path().join("T1.gridss.vcf.gz");
        std::fs::write(&output, "calls").unwrap();

        let entry = make_entry(&output, "abcdef0123");
        cache.store(&entry).await.unwrap();
        std::fs::remove_file(&output).unwrap();

        assert!(cache.get(&entry.fingerprint).await.unwrap().is_none());
        assert_eq!(cache.stats().await.unwrap().entries, 0);
    }

    #[tokio::test]
    async fn test_truncated_output_drops_entry() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FilesystemCache::new(temp_dir.path().join("cache")).unwrap();
        let output = temp_dir.path().join("T1.gridss.vcf.gz");
        std::fs::write(&output, "calls").unwrap();

        let entry = make_entry(&output, "abcdef0123");
        cache.store(&entry).await.unwrap();
        std::fs::write(&output, "").unwrap();

        assert!(cache.get(&entry.fingerprint).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_invalidate() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FilesystemCache::new(temp_dir.path().join("cache")).unwrap();
        let output = temp_dir.path().join("T1.gridss.vcf.gz");
        std::fs::write(&output, "calls").unwrap();

        let entry = make_entry(&output, "abcdef0123");
        cache.store(&entry).await.unwrap();

        assert!(cache.invalidate(&entry.fingerprint).await.unwrap());
        assert!(!cache.invalidate(&entry.fingerprint).await.unwrap());
        assert!(cache.get(&entry.fingerprint).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_clear() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FilesystemCache::new(temp_dir.path().join("cache")).unwrap();
        let output = temp_dir.path().join("T1.gridss.vcf.gz");
        std::fs::write(&output, "calls").unwrap();

        cache.store(&make_entry(&output, "aa01")).await.unwrap();
        cache.store(&make_entry(&output, "bb02")).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(cache.entries().await.unwrap().len(), 2);

        cache.clear().await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entries, 0);
    }
}
