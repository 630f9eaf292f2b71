// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! PURPLE: purity, ploidy and copy number

use std::path::Path;

use super::{java, sample_file, PostCondition, PurpleInputs, StageKind, StageOutput, StagePlan};
use crate::model::{ArtifactRef, SampleIdentity};
use crate::pipeline::RunConfig;

pub(super) fn plan(identity: &SampleIdentity, inputs: &PurpleInputs, config: &RunConfig, dir: &Path) -> StagePlan {
    let reference = &config.reference;
    let sv_vcf = sample_file(dir, identity, ".purple.sv.vcf.gz");
    let purity = sample_file(dir, identity, ".purple.purity.tsv");

    let mut command = java(config, &config.tools.purple_jar, None, dir)
        .opt("-tumor", identity.tumour_name())
        .opt("-reference", identity.normal_name())
        .opt("-amber", inputs.amber_dir.path().display())
        .opt("-cobalt", inputs.cobalt_dir.path().display())
        .opt("-structural_vcf", inputs.sv_filtered.path().display())
        .opt("-sv_recovery_vcf", inputs.sv_unfiltered.path().display())
        .opt("-ref_genome", reference.resolve(&reference.genome).display())
        .opt("-ref_genome_version", config.options.ref_genome_version)
        .opt("-gc_profile", reference.resolve(&reference.cobalt_gc_profile).display())
        .opt(
            "-ensembl_data_dir",
            reference.resolve(&reference.ensembl_data_cache).display(),
        )
        .opt(
            "-somatic_hotspots",
            reference.resolve(&reference.known_hotspots).display(),
        )
        .opt(
            "-driver_gene_panel",
            reference.resolve(&reference.driver_gene_panel).display(),
        )
        .opt("-circos", config.tools.circos.display())
        .opt("-output_dir", dir.display())
        .opt("-threads", config.resources.cpus);

    if !inputs.small_variants.is_absent() {
        command = command.opt("-somatic_vcf", inputs.small_variants.path().display());
    }

    StagePlan::new(
        StageKind::Purple,
        command,
        StageOutput::Purple {
            dir: ArtifactRef::directory(dir),
            sv_vcf: ArtifactRef::file(&sv_vcf),
            purity: ArtifactRef::file(&purity),
        },
    )
    .require(PostCondition::NonEmptyFile(sv_vcf))
    .require(PostCondition::NonEmptyFile(purity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(small_variants: ArtifactRef) -> PurpleInputs {
        PurpleInputs {
            amber_dir: ArtifactRef::directory("/out/amber"),
            cobalt_dir: ArtifactRef::directory("/out/cobalt"),
            sv_filtered: ArtifactRef::file("/out/gripss/T1.gripss.filtered.vcf.gz"),
            sv_unfiltered: ArtifactRef::file("/out/gripss/T1.gripss.vcf.gz"),
            small_variants,
        }
    }

    #[test]
    fn test_small_variants_only_when_supplied() {
        let config = RunConfig::default();
        let identity = SampleIdentity::new("T1", "N1").unwrap();
        let dir = config.stage_dir(&identity, StageKind::Purple);

        let without = plan(&identity, &inputs(ArtifactRef::no_file()), &config, &dir);
        assert!(!without.command.render().contains("-somatic_vcf"));
        assert!(!without.command.render().contains("NOFILE"));

        let with = plan(
            &identity,
            &inputs(ArtifactRef::file("/data/T1.smlv.vcf.gz")),
            &config,
            &dir,
        );
        assert!(with
            .command
            .render()
            .contains("-somatic_vcf /data/T1.smlv.vcf.gz"));
    }
}
