// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! AMBER: B-allele frequencies at germline heterozygous sites

use std::path::Path;

use super::{java, sample_file, AlignmentPair, PostCondition, StageKind, StageOutput, StagePlan};
use crate::model::{ArtifactRef, SampleIdentity};
use crate::pipeline::RunConfig;

pub(super) fn plan(identity: &SampleIdentity, pair: &AlignmentPair, config: &RunConfig, dir: &Path) -> StagePlan {
    let command = java(config, &config.tools.amber_jar, None, dir)
        .opt("-tumor", identity.tumour_name())
        .opt("-tumor_bam", pair.tumour_bam.path().display())
        .opt("-reference", identity.normal_name())
        .opt("-reference_bam", pair.normal_bam.path().display())
        .opt("-output_dir", dir.display())
        .opt("-loci", config.reference.resolve(&config.reference.amber_loci).display())
        .opt("-ref_genome_version", config.options.ref_genome_version)
        .opt("-threads", config.resources.cpus);

    StagePlan::new(
        StageKind::Amber,
        command,
        StageOutput::Amber {
            dir: ArtifactRef::directory(dir),
        },
    )
    .require(PostCondition::NonEmptyFile(sample_file(dir, identity, ".amber.baf.tsv.gz")))
}
