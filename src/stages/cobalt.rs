// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! COBALT: read depth ratios

use std::path::Path;

use super::{java, sample_file, AlignmentPair, PostCondition, StageKind, StageOutput, StagePlan};
use crate::model::{ArtifactRef, SampleIdentity};
use crate::pipeline::RunConfig;

pub(super) fn plan(identity: &SampleIdentity, pair: &AlignmentPair, config: &RunConfig, dir: &Path) -> StagePlan {
    let command = java(config, &config.tools.cobalt_jar, None, dir)
        .opt("-tumor", identity.tumour_name())
        .opt("-tumor_bam", pair.tumour_bam.path().display())
        .opt("-reference", identity.normal_name())
        .opt("-reference_bam", pair.normal_bam.path().display())
        .opt("-output_dir", dir.display())
        .opt(
            "-gc_profile",
            config.reference.resolve(&config.reference.cobalt_gc_profile).display(),
        )
        .opt("-threads", config.resources.cpus);

    StagePlan::new(
        StageKind::Cobalt,
        command,
        StageOutput::Cobalt {
            dir: ArtifactRef::directory(dir),
        },
    )
    .require(PostCondition::NonEmptyFile(sample_file(dir, identity, ".cobalt.ratio.tsv.gz")))
}
