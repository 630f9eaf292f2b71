// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! GRIPSS: structural variant filtering

use std::path::Path;

use super::{java, sample_file, PostCondition, StageKind, StageOutput, StagePlan};
use crate::model::{ArtifactRef, SampleIdentity};
use crate::pipeline::RunConfig;

pub(super) fn plan(identity: &SampleIdentity, calls: &ArtifactRef, config: &RunConfig, dir: &Path) -> StagePlan {
    let reference = &config.reference;
    let filtered = sample_file(dir, identity, ".gripss.filtered.vcf.gz");
    let unfiltered = sample_file(dir, identity, ".gripss.vcf.gz");

    let command = java(config, &config.tools.gripss_jar, None, dir)
        .opt("-sample", identity.tumour_name())
        .opt("-reference", identity.normal_name())
        .opt("-ref_genome", reference.resolve(&reference.genome).display())
        .opt("-ref_genome_version", config.options.ref_genome_version)
        .opt(
            "-pon_sgl_file",
            reference.resolve(&reference.gridss_breakend_pon).display(),
        )
        .opt(
            "-pon_sv_file",
            reference.resolve(&reference.gridss_breakpoint_pon).display(),
        )
        .opt(
            "-known_hotspot_file",
            reference.resolve(&reference.known_fusions).display(),
        )
        .opt("-vcf", calls.path().display())
        .opt("-output_dir", dir.display());

    StagePlan::new(
        StageKind::Gripss,
        command,
        StageOutput::FilteredSv {
            filtered: ArtifactRef::file(&filtered),
            unfiltered: ArtifactRef::file(&unfiltered),
        },
    )
    .require(PostCondition::NonEmptyFile(filtered))
    .require(PostCondition::NonEmptyFile(unfiltered))
}
