// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Artifact handles
//!
//! An `ArtifactRef` points at a file or directory produced by a stage (or
//! supplied at entry). Absent optional inputs are represented by the `NOFILE`
//! sentinel so that joins still see a filled slot.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Path used for the "no file" sentinel
pub const NO_FILE: &str = "NOFILE";

/// What an artifact reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    File,
    Directory,
    /// Sentinel for an optional input that was not supplied
    Absent,
}

/// Content summary recorded when an artifact is created
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactSummary {
    /// Total size in bytes (recursive for directories)
    pub size_bytes: u64,
    /// BLAKE3 digest of the content (or of path/size/mtime, per invalidation strategy)
    pub digest: String,
}

/// Immutable handle to a produced file or directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    path: PathBuf,
    kind: ArtifactKind,
    #[serde(default)]
    summary: Option<ArtifactSummary>,
}

impl ArtifactRef {
    /// Reference a file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::File,
            summary: None,
        }
    }

    /// Reference a directory
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::Directory,
            summary: None,
        }
    }

    /// The "no file" sentinel
    pub fn no_file() -> Self {
        Self {
            path: PathBuf::from(NO_FILE),
            kind: ArtifactKind::Absent,
            summary: None,
        }
    }

    /// Reference a file if given, otherwise the sentinel
    pub fn optional_file(path: Option<&Path>) -> Self {
        path.map(Self::file).unwrap_or_else(Self::no_file)
    }

    /// Attach a content summary
    pub fn with_summary(mut self, summary: ArtifactSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn summary(&self) -> Option<&ArtifactSummary> {
        self.summary.as_ref()
    }

    /// Whether this is the "no file" sentinel
    pub fn is_absent(&self) -> bool {
        self.kind == ArtifactKind::Absent
    }

    /// Whether the referenced path currently exists with the expected kind
    pub fn exists(&self) -> bool {
        match self.kind {
            ArtifactKind::File => self.path.is_file(),
            ArtifactKind::Directory => self.path.is_dir(),
            ArtifactKind::Absent => false,
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
