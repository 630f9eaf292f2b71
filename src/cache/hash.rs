// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Content hashing for fingerprints and artifact summaries
//!
//! Uses BLAKE3. Fields are NUL-separated so adjacent values cannot run together.

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::errors::{GplError, GplResult};
use crate::executors::ToolCommand;
use crate::model::{ArtifactKind, ArtifactRef, ArtifactSummary, SampleIdentity, NO_FILE};
use crate::pipeline::CacheInvalidation;
use crate::stages::StageKind;

/// Memoization key of one stage invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap a hex digest
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content hasher for fingerprints
pub struct ContentHasher {
    hasher: Hasher,
}

impl ContentHasher {
    /// Create a new content hasher
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }

    /// Fingerprint a stage invocation
    ///
    /// Covers the stage, the identity, the recorded digests of every input in
    /// order, and the rendered command line (which carries all parameters and
    /// reference paths).
    pub fn fingerprint_invocation(
        stage: StageKind,
        identity: &SampleIdentity,
        inputs: &[&ArtifactRef],
        command: &ToolCommand,
    ) -> Fingerprint {
        let mut hasher = Self::new();
        hasher.field(stage.name().as_bytes());
        hasher.field(identity.tumour_name().as_bytes());
        hasher.field(identity.normal_name().as_bytes());

        for input in inputs {
            match input.summary() {
                Some(summary) => hasher.field(summary.digest.as_bytes()),
                // Unsummarized inputs fall back to their path
                None => hasher.field(input.path().to_string_lossy().as_bytes()),
            }
        }

        hasher.field(command.render().as_bytes());
        Fingerprint(hasher.finalize())
    }

    /// Hash arbitrary bytes
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Hash bytes followed by a separator
    pub fn field(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.hasher.update(&[0]);
    }

    /// Hash a file's contents, streaming
    pub fn hash_file(&mut self, path: &Path) -> GplResult<()> {
        let mut file = File::open(path).map_err(|e| GplError::read_failed(path, e))?;
        std::io::copy(&mut file, &mut self.hasher).map_err(|e| GplError::read_failed(path, e))?;
        Ok(())
    }

    /// Finalize and get the hash
    pub fn finalize(self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Summarize an artifact under the given strategy; performs blocking reads
pub fn summarize(artifact: &ArtifactRef, strategy: CacheInvalidation) -> GplResult<ArtifactSummary> {
    let mut hasher = ContentHasher::new();

    let size_bytes = match artifact.kind() {
        ArtifactKind::Absent => {
            hasher.field(NO_FILE.as_bytes());
            0
        }
        ArtifactKind::File => {
            hasher.field(b"file");
            hash_entry(&mut hasher, artifact.path(), artifact.path(), strategy)?
        }
        ArtifactKind::Directory => {
            hasher.field(b"directory");
            let mut total = 0;
            for file in walk_files(artifact.path())? {
                total += hash_entry(&mut hasher, artifact.path(), &file, strategy)?;
            }
            total
        }
    };

    Ok(ArtifactSummary {
        size_bytes,
        digest: hasher.finalize(),
    })
}

/// Current size of an artifact; `None` when it is missing
pub fn current_size(artifact: &ArtifactRef) -> Option<u64> {
    match artifact.kind() {
        ArtifactKind::Absent => Some(0),
        ArtifactKind::File => std::fs::metadata(artifact.path())
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len()),
        ArtifactKind::Directory => {
            if !artifact.path().is_dir() {
                return None;
            }
            let files = walk_files(artifact.path()).ok()?;
            files
                .iter()
                .map(|f| std::fs::metadata(f).map(|m| m.len()).ok())
                .sum()
        }
    }
}

fn hash_entry(hasher: &mut ContentHasher, root: &Path, path: &Path, strategy: CacheInvalidation) -> GplResult<u64> {
    let metadata = std::fs::metadata(path).map_err(|e| GplError::read_failed(path, e))?;
    let relative = path.strip_prefix(root).unwrap_or(path);

    // Paths are hashed relative so relocating an output tree keeps digests stable
    hasher.field(relative.to_string_lossy().as_bytes());
    hasher.field(&metadata.len().to_le_bytes());

    match strategy {
        CacheInvalidation::ContentHash => {
            hasher.hash_file(path)?;
            hasher.field(b"");
        }
        CacheInvalidation::Mtime => {
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            hasher.field(&mtime.to_le_bytes());
        }
        CacheInvalidation::Manual => {}
    }

    Ok(metadata.len())
}

/// Every regular file below `dir`, sorted
fn walk_files(dir: &Path) -> GplResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|e| GplError::read_failed(&current, e))?;
        for entry in entries {
            let path = entry.map_err(|e| GplError::read_failed(&current, e))?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn command(arg: &str) -> ToolCommand {
        ToolCommand::new("java", "/out").arg(arg)
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let identity = SampleIdentity::new("T1", "N1").unwrap();
        let input = ArtifactRef::file("/data/t.bam").with_summary(ArtifactSummary {
            size_bytes: 10,
            digest: "aa".into(),
        });

        let a = ContentHasher::fingerprint_invocation(StageKind::Amber, &identity, &[&input], &command("-x"));
        let b = ContentHasher::fingerprint_invocation(StageKind::Amber, &identity, &[&input], &command("-x"));
        assert_eq!(a, b);

        let other_stage =
            ContentHasher::fingerprint_invocation(StageKind::Cobalt, &identity, &[&input], &command("-x"));
        let other_args =
            ContentHasher::fingerprint_invocation(StageKind::Amber, &identity, &[&input], &command("-y"));
        assert_ne!(a, other_stage);
        assert_ne!(a, other_args);
    }

    #[test]
    fn test_fingerprint_tracks_input_digest() {
        let identity = SampleIdentity::new("T1", "N1").unwrap();
        let summarized = |digest: &str| {
            ArtifactRef::file("/data/t.bam").with_summary(ArtifactSummary {
                size_bytes: 10,
                digest: digest.into(),
            })
        };

        let a = ContentHasher::fingerprint_invocation(
            StageKind::Gridss,
            &identity,
            &[&summarized("aa")],
            &command("-x"),
        );
        let b = ContentHasher::fingerprint_invocation(
            StageKind::Gridss,
            &identity,
            &[&summarized("bb")],
            &command("-x"),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_summarize_content_changes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("calls.vcf");
        std::fs::write(&path, "one").unwrap();
        let artifact = ArtifactRef::file(&path);

        let first = summarize(&artifact, CacheInvalidation::ContentHash).unwrap();
        assert_eq!(first.size_bytes, 3);
        assert_eq!(first, summarize(&artifact, CacheInvalidation::ContentHash).unwrap());

        std::fs::write(&path, "two").unwrap();
        let second = summarize(&artifact, CacheInvalidation::ContentHash).unwrap();
        assert_ne!(first.digest, second.digest);

        // Same path and size: invisible to the manual strategy
        assert_eq!(
            summarize(&artifact, CacheInvalidation::Manual).unwrap().digest,
            summarize(&ArtifactRef::file(&path), CacheInvalidation::Manual).unwrap().digest
        );
    }

    #[test]
    fn test_summarize_directory_and_sentinel() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        std::fs::write(temp_dir.path().join("a.tsv"), "12345").unwrap();
        std::fs::write(temp_dir.path().join("sub/b.tsv"), "678").unwrap();

        let dir = ArtifactRef::directory(temp_dir.path());
        let summary = summarize(&dir, CacheInvalidation::ContentHash).unwrap();
        assert_eq!(summary.size_bytes, 8);
        assert_eq!(current_size(&dir), Some(8));

        let sentinel = summarize(&ArtifactRef::no_file(), CacheInvalidation::ContentHash).unwrap();
        assert_eq!(sentinel.size_bytes, 0);
        assert_ne!(sentinel.digest, summary.digest);
    }

    #[test]
    fn test_current_size_of_missing_file() {
        assert_eq!(current_size(&ArtifactRef::file("/nonexistent/x.vcf")), None);
    }
}
