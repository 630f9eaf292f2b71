// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Sample sheets and admission
//!
//! Admission turns a sheet entry into an identity plus its entry artifacts,
//! rejecting anything the tools would choke on later.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::{GplError, GplResult};
use crate::gate::vcf;
use crate::model::{ArtifactRef, SampleIdentity};
use crate::stages::AlignmentPair;

/// One tumour/normal pair as supplied by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleEntry {
    pub tumour_name: String,
    pub normal_name: String,
    pub tumour_bam: PathBuf,
    pub normal_bam: PathBuf,
    /// Small variant calls passed to PURPLE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tumour_smlv_vcf: Option<PathBuf>,
    /// Auxiliary SV calls merged with GRIDSS output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tumour_sv_vcf: Option<PathBuf>,
}

/// An entry that passed admission
#[derive(Debug, Clone)]
pub struct AdmittedSample {
    pub identity: SampleIdentity,
    pub alignments: AlignmentPair,
    /// Small variant calls, or the sentinel
    pub small_variants: ArtifactRef,
    /// Auxiliary SV calls, or the sentinel
    pub structural_variants: ArtifactRef,
}

impl SampleEntry {
    /// Build the identity, validating both names
    pub fn identity(&self) -> GplResult<SampleIdentity> {
        SampleIdentity::new(&self.tumour_name, &self.normal_name)
    }

    /// Resolve relative paths against `base`
    pub fn absolutize(&mut self, base: &Path) {
        let paths = [
            Some(&mut self.tumour_bam),
            Some(&mut self.normal_bam),
            self.tumour_smlv_vcf.as_mut(),
            self.tumour_sv_vcf.as_mut(),
        ];
        for path in paths.into_iter().flatten() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Check inputs and resolve entry artifacts; performs blocking reads
    pub fn admit(&self, max_scan_bytes: u64) -> GplResult<AdmittedSample> {
        let identity = self.identity()?;
        let invalid = |reason: String| GplError::InvalidSample {
            sample: identity.to_string(),
            reason,
        };

        if self.tumour_bam == self.normal_bam {
            return Err(invalid("tumour and normal BAM are the same file".into()));
        }

        let tumour_bam = check_bam(&self.tumour_bam).map_err(invalid)?;
        let tumour_bai = find_bam_index(&self.tumour_bam).map_err(invalid)?;
        let normal_bam = check_bam(&self.normal_bam).map_err(invalid)?;
        let normal_bai = find_bam_index(&self.normal_bam).map_err(invalid)?;

        let mut optional = Vec::with_capacity(2);
        for vcf_path in [&self.tumour_smlv_vcf, &self.tumour_sv_vcf] {
            let artifact = match vcf_path {
                Some(path) => {
                    check_vcf(path).map_err(invalid)?;
                    check_vcf_sample_names(path, &identity, max_scan_bytes)?;
                    ArtifactRef::file(path)
                }
                None => ArtifactRef::no_file(),
            };
            optional.push(artifact);
        }
        let structural_variants = optional.pop().unwrap_or_else(ArtifactRef::no_file);
        let small_variants = optional.pop().unwrap_or_else(ArtifactRef::no_file);

        Ok(AdmittedSample {
            identity,
            alignments: AlignmentPair {
                tumour_bam,
                tumour_bai,
                normal_bam,
                normal_bai,
            },
            small_variants,
            structural_variants,
        })
    }
}

fn check_bam(path: &Path) -> Result<ArtifactRef, String> {
    if path.extension().and_then(|e| e.to_str()) != Some("bam") {
        return Err(format!("'{}' does not have a .bam extension", path.display()));
    }
    if !path.is_file() {
        return Err(format!("BAM '{}' does not exist", path.display()));
    }
    Ok(ArtifactRef::file(path))
}

/// Locate the index next to a BAM: `<bam>.bai`, then `<stem>.bai`
fn find_bam_index(bam: &Path) -> Result<ArtifactRef, String> {
    let mut appended = bam.as_os_str().to_os_string();
    appended.push(".bai");
    let candidates = [PathBuf::from(appended), bam.with_extension("bai")];

    candidates
        .iter()
        .find(|p| p.is_file())
        .map(ArtifactRef::file)
        .ok_or_else(|| format!("no index found for '{}' (expected '{}')", bam.display(), candidates[0].display()))
}

fn check_vcf(path: &Path) -> Result<(), String> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if !(name.ends_with(".vcf") || name.ends_with(".vcf.gz")) {
        return Err(format!("'{}' does not have a .vcf or .vcf.gz extension", path.display()));
    }
    if !path.is_file() {
        return Err(format!("VCF '{}' does not exist", path.display()));
    }
    Ok(())
}

/// The VCF must carry exactly the tumour and normal sample columns
pub fn check_vcf_sample_names(path: &Path, identity: &SampleIdentity, max_scan_bytes: u64) -> GplResult<()> {
    let names = vcf::sample_names(path, max_scan_bytes)?;

    let mut problems = Vec::new();
    for expected in [identity.tumour_name(), identity.normal_name()] {
        if !names.iter().any(|n| n == expected) {
            problems.push(format!("sample '{}' not found", expected));
        }
    }
    if names.len() != 2 {
        problems.push(format!("expected 2 samples but found {}", names.len()));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(GplError::InvalidSample {
            sample: identity.to_string(),
            reason: format!("'{}': {}", path.display(), problems.join("; ")),
        })
    }
}

/// A list of sample entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleSheet {
    pub samples: Vec<SampleEntry>,
}

impl SampleSheet {
    /// Load a YAML sheet; relative paths resolve against the sheet's directory
    pub fn from_file(path: &Path) -> GplResult<Self> {
        if !path.exists() {
            return Err(GplError::SampleSheetNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| GplError::read_failed(path, e))?;
        let mut sheet = Self::from_yaml(&content)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let base = if base.as_os_str().is_empty() {
            std::env::current_dir()?
        } else {
            std::fs::canonicalize(base).map_err(|e| GplError::read_failed(base, e))?
        };
        for sample in &mut sheet.samples {
            sample.absolutize(&base);
        }

        Ok(sheet)
    }

    /// Parse from a YAML string
    pub fn from_yaml(yaml: &str) -> GplResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Sheet holding a single entry
    pub fn single(entry: SampleEntry) -> Self {
        Self {
            samples: vec![entry],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `tumour__normal` names that appear more than once
    pub fn duplicates(&self) -> Vec<String> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for sample in &self.samples {
            *counts
                .entry(format!("{}__{}", sample.tumour_name, sample.normal_name))
                .or_default() += 1;
        }

        let mut duplicates: Vec<String> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name)
            .collect();
        duplicates.sort();
        duplicates
    }
}
