// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Run configuration
//!
//! Defines the schema for gplflow.yaml (or gplflow.toml). Every section is
//! optional; defaults follow the hg38 reference layout.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{GplError, GplResult};
use crate::gate::DEFAULT_MAX_SCAN_BYTES;
use crate::model::SampleIdentity;
use crate::stages::{ResourceClass, StageKind};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "gplflow.yaml";

/// Name of the status log inside the output directory
pub const STATUS_LOG_FILE: &str = "status.jsonl";

/// Immutable parameters for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Root of all per-identity stage directories
    pub output_dir: PathBuf,
    pub tools: ToolsConfig,
    pub reference: ReferenceConfig,
    pub options: OptionsConfig,
    pub resources: ResourcesConfig,
    pub gate: GateConfig,
    pub cache: CacheConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            tools: ToolsConfig::default(),
            reference: ReferenceConfig::default(),
            options: OptionsConfig::default(),
            resources: ResourcesConfig::default(),
            gate: GateConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load from a YAML or TOML file, chosen by extension
    pub fn from_file(path: &Path) -> GplResult<Self> {
        if !path.exists() {
            return Err(GplError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| GplError::read_failed(path, e))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Parse from a YAML string
    pub fn from_yaml(yaml: &str) -> GplResult<Self> {
        // An empty file is a valid, all-defaults configuration
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Parse from a TOML string
    pub fn from_toml(toml_str: &str) -> GplResult<Self> {
        toml::from_str(toml_str).map_err(Into::into)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> GplResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Make every relative filesystem path absolute against `base`
    ///
    /// Tools run inside their stage directory, so relative paths on their
    /// command lines would resolve against the wrong place.
    pub fn absolutize(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        join(&mut self.output_dir);
        join(&mut self.reference.root);
        join(&mut self.cache.directory);
        for jar in self.tools.jars_mut() {
            join(jar);
        }
    }

    /// `<output_dir>/<tumour>__<normal>`
    pub fn identity_dir(&self, identity: &SampleIdentity) -> PathBuf {
        self.output_dir.join(identity.namespace())
    }

    /// `<output_dir>/<tumour>__<normal>/<stage>`
    pub fn stage_dir(&self, identity: &SampleIdentity, stage: StageKind) -> PathBuf {
        self.identity_dir(identity).join(stage.name())
    }

    pub fn status_log_path(&self) -> PathBuf {
        self.output_dir.join(STATUS_LOG_FILE)
    }

    /// Wall-clock budget for a resource class
    pub fn timeout_for(&self, class: ResourceClass) -> Duration {
        let timeouts = &self.resources.timeouts;
        Duration::from_secs(match class {
            ResourceClass::Light => timeouts.light_secs,
            ResourceClass::Standard => timeouts.standard_secs,
            ResourceClass::Heavy => timeouts.heavy_secs,
        })
    }
}

/// Locations of the external tools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub java: PathBuf,
    pub amber_jar: PathBuf,
    pub cobalt_jar: PathBuf,
    /// GRIDSS driver script
    pub gridss: PathBuf,
    pub gridss_jar: PathBuf,
    /// RepeatMasker annotation script shipped with GRIDSS
    pub gridss_annotate: PathBuf,
    pub bcftools: PathBuf,
    pub gripss_jar: PathBuf,
    pub purple_jar: PathBuf,
    pub linx_jar: PathBuf,
    pub circos: PathBuf,
    /// Report generator
    pub report: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            java: PathBuf::from("java"),
            amber_jar: PathBuf::from("/opt/hmftools/amber.jar"),
            cobalt_jar: PathBuf::from("/opt/hmftools/cobalt.jar"),
            gridss: PathBuf::from("gridss"),
            gridss_jar: PathBuf::from("/opt/gridss/gridss-2.12.1-gridss-jar-with-dependencies.jar"),
            gridss_annotate: PathBuf::from("gridss_annotate_vcf_repeatmasker"),
            bcftools: PathBuf::from("bcftools"),
            gripss_jar: PathBuf::from("/opt/hmftools/gripss.jar"),
            purple_jar: PathBuf::from("/opt/hmftools/purple.jar"),
            linx_jar: PathBuf::from("/opt/hmftools/linx.jar"),
            circos: PathBuf::from("circos"),
            report: PathBuf::from("gpl_report"),
        }
    }
}

impl ToolsConfig {
    /// Executables looked up on PATH (or given as paths)
    pub fn programs(&self) -> Vec<(&'static str, &Path)> {
        vec![
            ("java", self.java.as_path()),
            ("gridss", self.gridss.as_path()),
            ("gridss_annotate", self.gridss_annotate.as_path()),
            ("bcftools", self.bcftools.as_path()),
            ("circos", self.circos.as_path()),
            ("report", self.report.as_path()),
        ]
    }

    /// Jar files, which must exist on disk
    pub fn jars(&self) -> Vec<(&'static str, &Path)> {
        vec![
            ("amber_jar", self.amber_jar.as_path()),
            ("cobalt_jar", self.cobalt_jar.as_path()),
            ("gridss_jar", self.gridss_jar.as_path()),
            ("gripss_jar", self.gripss_jar.as_path()),
            ("purple_jar", self.purple_jar.as_path()),
            ("linx_jar", self.linx_jar.as_path()),
        ]
    }

    fn jars_mut(&mut self) -> [&mut PathBuf; 6] {
        [
            &mut self.amber_jar,
            &mut self.cobalt_jar,
            &mut self.gridss_jar,
            &mut self.gripss_jar,
            &mut self.purple_jar,
            &mut self.linx_jar,
        ]
    }
}

/// Reference data, relative to `root` unless absolute
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub root: PathBuf,
    pub genome: PathBuf,
    pub amber_loci: PathBuf,
    pub cobalt_gc_profile: PathBuf,
    pub gridss_blacklist: PathBuf,
    pub gridss_breakend_pon: PathBuf,
    pub gridss_breakpoint_pon: PathBuf,
    pub linx_fragile_sites: PathBuf,
    pub linx_line_elements: PathBuf,
    pub linx_rep_origins: PathBuf,
    pub ensembl_data_cache: PathBuf,
    pub known_hotspots: PathBuf,
    pub known_fusions: PathBuf,
    pub known_fusion_data: PathBuf,
    pub driver_gene_panel: PathBuf,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("reference"),
            genome: PathBuf::from("genome/umccrise_hg38/hg38.fa"),
            amber_loci: PathBuf::from("Amber/38/GermlineHetPon.38.vcf.gz"),
            cobalt_gc_profile: PathBuf::from("Cobalt/38/GC_profile.1000bp.38.cnp"),
            gridss_blacklist: PathBuf::from("GRIDSS/38/ENCFF356LFX.bed"),
            gridss_breakend_pon: PathBuf::from("GRIDSS/38/gridss_pon_single_breakend.38.bed"),
            gridss_breakpoint_pon: PathBuf::from("GRIDSS/38/gridss_pon_breakpoint.38.bedpe"),
            linx_fragile_sites: PathBuf::from("Linx/38/fragile_sites_hmf.38.csv"),
            linx_line_elements: PathBuf::from("Linx/38/line_elements.38.csv"),
            linx_rep_origins: PathBuf::from("Linx/38/heli_rep_origins_empty.bed"),
            ensembl_data_cache: PathBuf::from("Ensembl-Data-Cache/38"),
            known_hotspots: PathBuf::from("Sage/38/KnownHotspots.somatic.38.vcf.gz"),
            known_fusions: PathBuf::from("Known-Fusions/38/known_fusions.38.bedpe"),
            known_fusion_data: PathBuf::from("Known-Fusions/38/known_fusion_data.38.csv"),
            driver_gene_panel: PathBuf::from("Gene-Panel/38/DriverGenePanel.38.tsv"),
        }
    }
}

impl ReferenceConfig {
    /// Resolve a reference path against `root`
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Every reference entry, resolved
    pub fn entries(&self) -> Vec<(&'static str, PathBuf)> {
        [
            ("genome", &self.genome),
            ("amber_loci", &self.amber_loci),
            ("cobalt_gc_profile", &self.cobalt_gc_profile),
            ("gridss_blacklist", &self.gridss_blacklist),
            ("gridss_breakend_pon", &self.gridss_breakend_pon),
            ("gridss_breakpoint_pon", &self.gridss_breakpoint_pon),
            ("linx_fragile_sites", &self.linx_fragile_sites),
            ("linx_line_elements", &self.linx_line_elements),
            ("linx_rep_origins", &self.linx_rep_origins),
            ("ensembl_data_cache", &self.ensembl_data_cache),
            ("known_hotspots", &self.known_hotspots),
            ("known_fusions", &self.known_fusions),
            ("known_fusion_data", &self.known_fusion_data),
            ("driver_gene_panel", &self.driver_gene_panel),
        ]
        .into_iter()
        .map(|(name, path)| (name, self.resolve(path)))
        .collect()
    }
}

/// Analysis options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    /// Run RepeatMasker annotation on GRIDSS calls
    pub annotate_gridss_calls: bool,
    /// GRIDSS JVM heap in GB
    pub gridss_jvmheap_gb: u32,
    /// Heap for the hmftools JVMs in GB
    pub java_heap_gb: u32,
    pub ref_genome_version: u32,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            annotate_gridss_calls: false,
            gridss_jvmheap_gb: 26,
            java_heap_gb: 8,
            ref_genome_version: 38,
        }
    }
}

/// Parallelism and time budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    /// Threads handed to each tool
    pub cpus: u32,
    /// Stage invocations running at once
    pub max_parallel: usize,
    pub timeouts: TimeoutConfig,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            cpus: 4,
            max_parallel: 2,
            timeouts: TimeoutConfig::default(),
        }
    }
}

/// Wall-clock budgets per resource class, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub light_secs: u64,
    pub standard_secs: u64,
    pub heavy_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            light_secs: 2 * 3600,
            standard_secs: 8 * 3600,
            heavy_secs: 48 * 3600,
        }
    }
}

/// Content gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Decompressed bytes read before giving up on finding a record
    pub max_scan_bytes: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_scan_bytes: DEFAULT_MAX_SCAN_BYTES,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable caching
    pub enabled: bool,

    /// Cache directory
    pub directory: PathBuf,

    /// How artifact digests are computed
    pub invalidation: CacheInvalidation,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from(".gplflow/cache"),
            invalidation: CacheInvalidation::default(),
        }
    }
}

/// Cache invalidation strategies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheInvalidation {
    /// Digest artifact content (default)
    #[default]
    ContentHash,
    /// Digest path, size and modification time
    Mtime,
    /// Digest path and size only; entries go stale only when invalidated
    Manual,
}
