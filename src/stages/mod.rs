// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Pipeline stages
//!
//! Each stage turns typed inputs into a `StagePlan`: the tool command to run,
//! the outputs it must leave behind and the post-conditions that prove it did.
//! Stages write only into `<output_dir>/<identity>/<stage>/`.

mod amber;
mod cobalt;
mod gridss;
mod gripss;
mod inputs;
mod linx;
mod purple;
mod report;

pub use inputs::{AlignmentPair, PurpleInputs, PurpleSlot, ReportInputs, ReportSlot, StageInputs};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::{GplError, GplResult};
use crate::executors::ToolCommand;
use crate::model::{ArtifactRef, SampleIdentity};
use crate::pipeline::RunConfig;

/// The processing stages of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Amber,
    Cobalt,
    Gridss,
    /// RepeatMasker annotation of the GRIDSS calls
    GridssAnnotate,
    /// Merge of GRIDSS calls with an auxiliary SV call set
    SvMerge,
    Gripss,
    Purple,
    Linx,
    /// LINX visualiser
    LinxPlot,
    Report,
}

impl StageKind {
    /// All stages, in a valid execution order
    pub const ALL: [StageKind; 10] = [
        StageKind::Amber,
        StageKind::Cobalt,
        StageKind::Gridss,
        StageKind::GridssAnnotate,
        StageKind::SvMerge,
        StageKind::Gripss,
        StageKind::Purple,
        StageKind::Linx,
        StageKind::LinxPlot,
        StageKind::Report,
    ];

    /// Name used for the stage directory and in logs
    pub fn name(self) -> &'static str {
        match self {
            Self::Amber => "amber",
            Self::Cobalt => "cobalt",
            Self::Gridss => "gridss",
            Self::GridssAnnotate => "gridss_annotate",
            Self::SvMerge => "sv_merge",
            Self::Gripss => "gripss",
            Self::Purple => "purple",
            Self::Linx => "linx",
            Self::LinxPlot => "linx_plot",
            Self::Report => "report",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn resource_class(self) -> ResourceClass {
        match self {
            Self::Gridss => ResourceClass::Heavy,
            Self::Amber | Self::Cobalt | Self::GridssAnnotate | Self::Gripss | Self::Purple => {
                ResourceClass::Standard
            }
            Self::SvMerge | Self::Linx | Self::LinxPlot | Self::Report => ResourceClass::Light,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Coarse resource demand, used to pick a wall-clock budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    Light,
    Standard,
    Heavy,
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Standard => write!(f, "standard"),
            Self::Heavy => write!(f, "heavy"),
        }
    }
}

/// Typed artifacts delivered along a graph edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageOutput {
    Amber { dir: ArtifactRef },
    Cobalt { dir: ArtifactRef },
    /// Unfiltered structural variant calls (GRIDSS, annotation, merge)
    SvCalls { vcf: ArtifactRef },
    /// GRIPSS output
    FilteredSv {
        filtered: ArtifactRef,
        unfiltered: ArtifactRef,
    },
    Purple {
        dir: ArtifactRef,
        sv_vcf: ArtifactRef,
        purity: ArtifactRef,
    },
    Linx { dir: ArtifactRef },
    LinxPlot { dir: ArtifactRef },
    Report { report: ArtifactRef },
    /// Small variant calls supplied at entry (possibly the sentinel)
    SmallVariants { vcf: ArtifactRef },
}

impl StageOutput {
    /// Every artifact, in a fixed order
    pub fn artifacts(&self) -> Vec<&ArtifactRef> {
        match self {
            Self::Amber { dir }
            | Self::Cobalt { dir }
            | Self::Linx { dir }
            | Self::LinxPlot { dir } => vec![dir],
            Self::SvCalls { vcf } | Self::SmallVariants { vcf } => vec![vcf],
            Self::FilteredSv {
                filtered,
                unfiltered,
            } => vec![filtered, unfiltered],
            Self::Purple {
                dir,
                sv_vcf,
                purity,
            } => vec![dir, sv_vcf, purity],
            Self::Report { report } => vec![report],
        }
    }

    /// The artifact downstream consumers care most about
    pub fn primary(&self) -> &ArtifactRef {
        match self {
            Self::FilteredSv { filtered, .. } => filtered,
            Self::Purple { sv_vcf, .. } => sv_vcf,
            other => other.artifacts()[0],
        }
    }

    /// Rebuild with every artifact passed through `f`
    pub fn try_map_artifacts<F>(self, mut f: F) -> GplResult<Self>
    where
        F: FnMut(ArtifactRef) -> GplResult<ArtifactRef>,
    {
        Ok(match self {
            Self::Amber { dir } => Self::Amber { dir: f(dir)? },
            Self::Cobalt { dir } => Self::Cobalt { dir: f(dir)? },
            Self::SvCalls { vcf } => Self::SvCalls { vcf: f(vcf)? },
            Self::FilteredSv {
                filtered,
                unfiltered,
            } => Self::FilteredSv {
                filtered: f(filtered)?,
                unfiltered: f(unfiltered)?,
            },
            Self::Purple {
                dir,
                sv_vcf,
                purity,
            } => Self::Purple {
                dir: f(dir)?,
                sv_vcf: f(sv_vcf)?,
                purity: f(purity)?,
            },
            Self::Linx { dir } => Self::Linx { dir: f(dir)? },
            Self::LinxPlot { dir } => Self::LinxPlot { dir: f(dir)? },
            Self::Report { report } => Self::Report { report: f(report)? },
            Self::SmallVariants { vcf } => Self::SmallVariants { vcf: f(vcf)? },
        })
    }
}

/// Checks applied after a zero exit, to catch tools that fail silently
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostCondition {
    FileExists(PathBuf),
    NonEmptyFile(PathBuf),
    DirectoryExists(PathBuf),
    NonEmptyDirectory(PathBuf),
}

impl PostCondition {
    /// Check the condition against the filesystem
    pub fn holds(&self) -> bool {
        match self {
            Self::FileExists(path) => path.is_file(),
            Self::NonEmptyFile(path) => std::fs::metadata(path)
                .map(|m| m.is_file() && m.len() > 0)
                .unwrap_or(false),
            Self::DirectoryExists(path) => path.is_dir(),
            Self::NonEmptyDirectory(path) => std::fs::read_dir(path)
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for PostCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileExists(p) => write!(f, "file exists: {}", p.display()),
            Self::NonEmptyFile(p) => write!(f, "non-empty file: {}", p.display()),
            Self::DirectoryExists(p) => write!(f, "directory exists: {}", p.display()),
            Self::NonEmptyDirectory(p) => write!(f, "non-empty directory: {}", p.display()),
        }
    }
}

/// Everything needed to run one stage for one identity
#[derive(Debug, Clone)]
pub struct StagePlan {
    pub stage: StageKind,
    pub command: ToolCommand,
    /// Outputs the tool is expected to produce
    pub outputs: StageOutput,
    pub postconditions: Vec<PostCondition>,
    pub resource_class: ResourceClass,
}

impl StagePlan {
    fn new(stage: StageKind, command: ToolCommand, outputs: StageOutput) -> Self {
        Self {
            stage,
            command,
            outputs,
            postconditions: Vec::new(),
            resource_class: stage.resource_class(),
        }
    }

    fn require(mut self, condition: PostCondition) -> Self {
        self.postconditions.push(condition);
        self
    }

    /// First post-condition that does not hold
    pub fn violated_postcondition(&self) -> Option<&PostCondition> {
        self.postconditions.iter().find(|c| !c.holds())
    }
}

/// Build the plan for `stage`
pub fn plan(
    stage: StageKind,
    identity: &SampleIdentity,
    inputs: &StageInputs,
    config: &RunConfig,
) -> GplResult<StagePlan> {
    let dir = config.stage_dir(identity, stage);

    let plan = match (stage, inputs) {
        (StageKind::Amber, StageInputs::Alignments(pair)) => amber::plan(identity, pair, config, &dir),
        (StageKind::Cobalt, StageInputs::Alignments(pair)) => cobalt::plan(identity, pair, config, &dir),
        (StageKind::Gridss, StageInputs::Alignments(pair)) => gridss::call(identity, pair, config, &dir),
        (StageKind::GridssAnnotate, StageInputs::SvCalls { calls }) => {
            gridss::annotate(identity, calls, config, &dir)
        }
        (StageKind::SvMerge, StageInputs::SvMerge { calls, auxiliary }) => {
            gridss::merge(identity, calls, auxiliary, config, &dir)
        }
        (StageKind::Gripss, StageInputs::SvCalls { calls }) => gripss::plan(identity, calls, config, &dir),
        (StageKind::Purple, StageInputs::Purple(purple_inputs)) => {
            purple::plan(identity, purple_inputs, config, &dir)
        }
        (StageKind::Linx, StageInputs::Linx { purple_dir, sv_vcf }) => {
            linx::annotate(identity, purple_dir, sv_vcf, config, &dir)
        }
        (StageKind::LinxPlot, StageInputs::LinxPlot { linx_dir }) => {
            linx::plot(identity, linx_dir, config, &dir)
        }
        (StageKind::Report, StageInputs::Report(report_inputs)) => {
            report::plan(identity, report_inputs, config, &dir)
        }
        (stage, inputs) => {
            return Err(GplError::InvalidTuple {
                target: stage.to_string(),
                reason: format!("received {} inputs", inputs.describe()),
            })
        }
    };

    Ok(plan)
}

/// Output forwarded unchanged when `stage` is bypassed for these inputs
///
/// Annotation is bypassed when disabled; the merge is bypassed when no
/// auxiliary call set was supplied. Either way the GRIDSS calls pass through.
pub fn bypass(stage: StageKind, inputs: &StageInputs, config: &RunConfig) -> Option<StageOutput> {
    match (stage, inputs) {
        (StageKind::GridssAnnotate, StageInputs::SvCalls { calls })
            if !config.options.annotate_gridss_calls =>
        {
            Some(StageOutput::SvCalls { vcf: calls.clone() })
        }
        (StageKind::SvMerge, StageInputs::SvMerge { calls, auxiliary }) if auxiliary.is_absent() => {
            Some(StageOutput::SvCalls { vcf: calls.clone() })
        }
        _ => None,
    }
}

/// `java` command for an hmftools jar
///
/// With `main_class` the jar goes on the classpath, otherwise it is run directly.
fn java(config: &RunConfig, jar: &Path, main_class: Option<&str>, dir: &Path) -> ToolCommand {
    let command = ToolCommand::new(config.tools.java.to_string_lossy(), dir)
        .arg(format!("-Xmx{}g", config.options.java_heap_gb));

    match main_class {
        Some(class) => command.opt("-cp", jar.display()).arg(class),
        None => command.opt("-jar", jar.display()),
    }
}

/// `<dir>/<tumour><suffix>`
fn sample_file(dir: &Path, identity: &SampleIdentity, suffix: &str) -> PathBuf {
    dir.join(format!("{}{}", identity.tumour_name(), suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identity() -> SampleIdentity {
        SampleIdentity::new("T1", "N1").unwrap()
    }

    fn calls() -> ArtifactRef {
        ArtifactRef::file("/out/T1__N1/gridss/T1.gridss.vcf.gz")
    }

    #[test]
    fn test_stage_names_round_trip() {
        for stage in StageKind::ALL {
            assert_eq!(StageKind::from_name(stage.name()), Some(stage));
        }
        assert_eq!(StageKind::from_name("bogus"), None);
    }

    #[test]
    fn test_merge_bypassed_without_auxiliary_calls() {
        let config = RunConfig::default();
        let inputs = StageInputs::SvMerge {
            calls: calls(),
            auxiliary: ArtifactRef::no_file(),
        };

        let forwarded = bypass(StageKind::SvMerge, &inputs, &config).unwrap();
        assert_eq!(forwarded, StageOutput::SvCalls { vcf: calls() });

        let inputs = StageInputs::SvMerge {
            calls: calls(),
            auxiliary: ArtifactRef::file("/data/T1.sv.vcf.gz"),
        };
        assert!(bypass(StageKind::SvMerge, &inputs, &config).is_none());
    }

    #[test]
    fn test_annotation_follows_option() {
        let mut config = RunConfig::default();
        let inputs = StageInputs::SvCalls { calls: calls() };

        assert!(bypass(StageKind::GridssAnnotate, &inputs, &config).is_some());
        config.options.annotate_gridss_calls = true;
        assert!(bypass(StageKind::GridssAnnotate, &inputs, &config).is_none());
        // Never bypassed: GRIPSS takes the same input shape
        assert!(bypass(StageKind::Gripss, &inputs, &config).is_none());
    }

    #[test]
    fn test_plan_rejects_mismatched_inputs() {
        let config = RunConfig::default();
        let inputs = StageInputs::SvCalls { calls: calls() };
        assert!(plan(StageKind::Purple, &identity(), &inputs, &config).is_err());
    }

    #[test]
    fn test_postconditions() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty.vcf.gz");
        std::fs::write(&empty, "").unwrap();

        assert!(PostCondition::FileExists(empty.clone()).holds());
        assert!(!PostCondition::NonEmptyFile(empty.clone()).holds());
        assert!(PostCondition::DirectoryExists(temp_dir.path().to_path_buf()).holds());
        assert!(PostCondition::NonEmptyDirectory(temp_dir.path().to_path_buf()).holds());
        assert!(!PostCondition::NonEmptyFile(temp_dir.path().join("missing")).holds());
    }
}
