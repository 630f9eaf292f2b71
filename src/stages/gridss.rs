// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! The SV-calling subgraph: GRIDSS, optional RepeatMasker annotation and
//! optional merge with auxiliary calls

use std::path::Path;

use super::{sample_file, AlignmentPair, PostCondition, StageKind, StageOutput, StagePlan};
use crate::executors::ToolCommand;
use crate::model::{ArtifactRef, SampleIdentity};
use crate::pipeline::RunConfig;

/// Structural variant calling with assembly
pub(super) fn call(identity: &SampleIdentity, pair: &AlignmentPair, config: &RunConfig, dir: &Path) -> StagePlan {
    let vcf = sample_file(dir, identity, ".gridss.vcf.gz");
    let reference = &config.reference;

    // GRIDSS labels samples in BAM order: normal first
    let command = ToolCommand::new(config.tools.gridss.to_string_lossy(), dir)
        .opt("--jar", config.tools.gridss_jar.display())
        .opt("--reference", reference.resolve(&reference.genome).display())
        .opt("--output", vcf.display())
        .opt(
            "--assembly",
            sample_file(dir, identity, ".gridss.assembly.bam").display(),
        )
        .opt("--workingdir", dir.join("work").display())
        .opt("--jvmheap", format!("{}g", config.options.gridss_jvmheap_gb))
        .opt("--threads", config.resources.cpus)
        .opt("--blacklist", reference.resolve(&reference.gridss_blacklist).display())
        .opt(
            "--labels",
            format!("{},{}", identity.normal_name(), identity.tumour_name()),
        )
        .arg(pair.normal_bam.path().display().to_string())
        .arg(pair.tumour_bam.path().display().to_string());

    StagePlan::new(
        StageKind::Gridss,
        command,
        StageOutput::SvCalls {
            vcf: ArtifactRef::file(&vcf),
        },
    )
    .require(PostCondition::NonEmptyFile(vcf))
}

/// RepeatMasker annotation of GRIDSS calls
pub(super) fn annotate(identity: &SampleIdentity, calls: &ArtifactRef, config: &RunConfig, dir: &Path) -> StagePlan {
    let vcf = sample_file(dir, identity, ".gridss.repeatmasker.vcf.gz");

    let command = ToolCommand::new(config.tools.gridss_annotate.to_string_lossy(), dir)
        .opt("--output", vcf.display())
        .opt("--jar", config.tools.gridss_jar.display())
        .opt("-w", dir.join("work").display())
        .opt("--threads", config.resources.cpus)
        .arg(calls.path().display().to_string());

    StagePlan::new(
        StageKind::GridssAnnotate,
        command,
        StageOutput::SvCalls {
            vcf: ArtifactRef::file(&vcf),
        },
    )
    .require(PostCondition::NonEmptyFile(vcf))
}

/// Concatenate GRIDSS calls with auxiliary tumour SV calls
pub(super) fn merge(
    identity: &SampleIdentity,
    calls: &ArtifactRef,
    auxiliary: &ArtifactRef,
    config: &RunConfig,
    dir: &Path,
) -> StagePlan {
    let vcf = sample_file(dir, identity, ".gridss.merged.vcf.gz");

    let command = ToolCommand::new(config.tools.bcftools.to_string_lossy(), dir)
        .arg("concat")
        .arg("--allow-overlaps")
        .arg("--remove-duplicates")
        .opt("--output-type", "z")
        .opt("--output", vcf.display())
        .arg(calls.path().display().to_string())
        .arg(auxiliary.path().display().to_string());

    StagePlan::new(
        StageKind::SvMerge,
        command,
        StageOutput::SvCalls {
            vcf: ArtifactRef::file(&vcf),
        },
    )
    .require(PostCondition::NonEmptyFile(vcf))
}
