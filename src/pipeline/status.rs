// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! The run status log (`status.jsonl`)
//!
//! One JSON line per finished invocation and one per identity outcome.
//! Lines are appended across runs; the latest outcome per identity wins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::errors::{GplError, GplResult};
use crate::model::{Outcome, SampleIdentity, StatusRecord};

/// Append-only JSON-lines status log
#[derive(Debug, Clone)]
pub struct StatusLog {
    path: PathBuf,
}

impl StatusLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record
    pub async fn append(&self, record: &StatusRecord) -> GplResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GplError::write_failed(parent, e))?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| GplError::write_failed(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| GplError::write_failed(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| GplError::write_failed(&self.path, e))?;

        Ok(())
    }

    /// Read every record; malformed lines are skipped
    pub fn read_records(&self) -> GplResult<Vec<StatusRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content =
            std::fs::read_to_string(&self.path).map_err(|e| GplError::read_failed(&self.path, e))?;

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Most recent outcome per identity
    pub fn latest_outcomes(&self) -> GplResult<BTreeMap<SampleIdentity, Outcome>> {
        let mut latest = BTreeMap::new();
        for record in self.read_records()? {
            if let StatusRecord::Outcome {
                identity, outcome, ..
            } = record
            {
                latest.insert(identity, outcome);
            }
        }
        Ok(latest)
    }
}
