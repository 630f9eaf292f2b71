// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Configuration validation
//!
//! Static checks run before anything is scheduled. Checks that touch the
//! filesystem or PATH live in a separate runtime pass.

use std::collections::HashSet;

use crate::errors::GplError;
use crate::pipeline::{PipelineGraph, RunConfig, SampleSheet};

/// JVM heaps above this are refused outright
pub const MAX_JVM_HEAP_GB: u32 = 100;

/// Run configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a run configuration
    pub fn validate(config: &RunConfig) -> Result<ValidationResult, GplError> {
        let mut result = ValidationResult::new();

        if config.resources.cpus == 0 {
            result.add_error("resources.cpus must be at least 1");
        }
        if config.resources.max_parallel == 0 {
            result.add_error("resources.max_parallel must be at least 1");
        }

        let timeouts = &config.resources.timeouts;
        for (name, secs) in [
            ("light_secs", timeouts.light_secs),
            ("standard_secs", timeouts.standard_secs),
            ("heavy_secs", timeouts.heavy_secs),
        ] {
            if secs == 0 {
                result.add_error(&format!("resources.timeouts.{} must be greater than zero", name));
            }
        }

        for (name, heap) in [
            ("gridss_jvmheap_gb", config.options.gridss_jvmheap_gb),
            ("java_heap_gb", config.options.java_heap_gb),
        ] {
            if heap == 0 {
                result.add_error(&format!("options.{} must be at least 1", name));
            } else if heap > MAX_JVM_HEAP_GB {
                result.add_error(&format!(
                    "options.{} is {} GB; refusing to use more than {} GB",
                    name, heap, MAX_JVM_HEAP_GB
                ));
            }
        }

        if config.options.ref_genome_version != 38 {
            result.add_warning(&format!(
                "options.ref_genome_version is {}; the default reference layout is for hg38",
                config.options.ref_genome_version
            ));
        }

        if config.gate.max_scan_bytes == 0 {
            result.add_error("gate.max_scan_bytes must be greater than zero");
        }

        if !config.cache.enabled {
            result.add_warning("cache is disabled; every stage will run on every invocation");
        }

        // The graph is fixed, but a broken build must never reach the scheduler
        if let Err(e) = PipelineGraph::build() {
            result.add_error(&format!("pipeline graph is invalid: {}", e));
        }

        Ok(result)
    }

    /// Validate a sample sheet's shape; per-sample input checks happen at admission
    pub fn validate_samples(sheet: &SampleSheet) -> ValidationResult {
        let mut result = ValidationResult::new();

        if sheet.is_empty() {
            result.add_error("sample sheet has no entries");
        }

        for duplicate in sheet.duplicates() {
            result.add_error(&format!("sample '{}' appears more than once", duplicate));
        }

        let mut seen_bams = HashSet::new();
        for sample in &sheet.samples {
            if sample.tumour_bam == sample.normal_bam {
                result.add_error(&format!(
                    "sample '{}__{}' uses the same BAM for tumour and normal",
                    sample.tumour_name, sample.normal_name
                ));
                continue;
            }
            for bam in [&sample.tumour_bam, &sample.normal_bam] {
                if !seen_bams.insert(bam) {
                    result.add_warning(&format!(
                        "BAM '{}' is used by more than one sample",
                        bam.display()
                    ));
                }
            }
        }

        result
    }

    /// Check that reference data and jars exist and programs resolve (runtime validation)
    pub fn validate_files(config: &RunConfig) -> Vec<String> {
        let mut missing = Vec::new();

        for (name, path) in config.reference.entries() {
            if !path.exists() {
                missing.push(format!("reference.{}: not found: {}", name, path.display()));
            }
        }

        for (name, path) in config.tools.jars() {
            if !path.is_file() {
                missing.push(format!("tools.{}: jar not found: {}", name, path.display()));
            }
        }

        for (name, program) in config.tools.programs() {
            if which::which(program).is_err() {
                missing.push(format!(
                    "tools.{}: '{}' is not executable or not on PATH",
                    name,
                    program.display()
                ));
            }
        }

        missing
    }
}

/// Result of validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Fold another result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::samples::tests::make_sample;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let result = ConfigValidator::validate(&RunConfig::default()).unwrap();
        assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn test_zero_resources_rejected() {
        let mut config = RunConfig::default();
        config.resources.cpus = 0;
        config.resources.max_parallel = 0;
        config.resources.timeouts.heavy_secs = 0;

        let result = ConfigValidator::validate(&config).unwrap();
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors.iter().any(|e| e.contains("heavy_secs")));
    }

    #[test]
    fn test_oversized_heap_rejected() {
        let mut config = RunConfig::default();
        config.options.gridss_jvmheap_gb = 128;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("refusing"));
    }

    #[test]
    fn test_disabled_cache_warns() {
        let mut config = RunConfig::default();
        config.cache.enabled = false;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_sample_sheet_checks() {
        let temp_dir = TempDir::new().unwrap();
        let first = make_sample(temp_dir.path(), "T1", "N1");
        let sheet = SampleSheet {
            samples: vec![first.clone(), first],
        };

        let result = ConfigValidator::validate_samples(&sheet);
        assert!(result.errors.iter().any(|e| e.contains("T1__N1")));

        let result = ConfigValidator::validate_samples(&SampleSheet::default());
        assert!(!result.is_valid());
    }

    #[test]
    fn test_validate_files_reports_missing() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = RunConfig::default();
        config.reference.root = temp_dir.path().join("reference");

        let missing = ConfigValidator::validate_files(&config);
        assert!(missing.iter().any(|m| m.starts_with("reference.genome")));
        assert!(missing.iter().any(|m| m.starts_with("tools.purple_jar")));
    }
}
