// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! LINX annotation and the LINX visualiser

use std::path::Path;

use super::{java, sample_file, PostCondition, StageKind, StageOutput, StagePlan};
use crate::model::{ArtifactRef, SampleIdentity};
use crate::pipeline::RunConfig;

const VISUALISER_CLASS: &str = "com.hartwig.hmftools.linx.visualiser.SvVisualiser";

/// Annotate, cluster and chain the purity-adjusted SVs
pub(super) fn annotate(
    identity: &SampleIdentity,
    purple_dir: &ArtifactRef,
    sv_vcf: &ArtifactRef,
    config: &RunConfig,
    dir: &Path,
) -> StagePlan {
    let reference = &config.reference;

    let command = java(config, &config.tools.linx_jar, None, dir)
        .opt("-sample", identity.tumour_name())
        .opt("-ref_genome_version", config.options.ref_genome_version)
        .opt("-sv_vcf", sv_vcf.path().display())
        .opt("-purple_dir", purple_dir.path().display())
        .opt("-output_dir", dir.display())
        .opt(
            "-fragile_site_file",
            reference.resolve(&reference.linx_fragile_sites).display(),
        )
        .opt(
            "-line_element_file",
            reference.resolve(&reference.linx_line_elements).display(),
        )
        .opt(
            "-replication_origins_file",
            reference.resolve(&reference.linx_rep_origins).display(),
        )
        .opt(
            "-ensembl_data_dir",
            reference.resolve(&reference.ensembl_data_cache).display(),
        )
        .arg("-check_fusions")
        .opt(
            "-known_fusion_file",
            reference.resolve(&reference.known_fusion_data).display(),
        )
        .arg("-check_drivers")
        .opt(
            "-driver_gene_panel",
            reference.resolve(&reference.driver_gene_panel).display(),
        )
        .arg("-write_vis_data");

    StagePlan::new(
        StageKind::Linx,
        command,
        StageOutput::Linx {
            dir: ArtifactRef::directory(dir),
        },
    )
    .require(PostCondition::NonEmptyFile(sample_file(dir, identity, ".linx.svs.tsv")))
}

/// Render circos plots from the LINX visualisation data
pub(super) fn plot(identity: &SampleIdentity, linx_dir: &ArtifactRef, config: &RunConfig, dir: &Path) -> StagePlan {
    let plot_dir = dir.join("plot");

    let command = java(config, &config.tools.linx_jar, Some(VISUALISER_CLASS), dir)
        .opt("-sample", identity.tumour_name())
        .opt(
            "-ensembl_data_dir",
            config.reference.resolve(&config.reference.ensembl_data_cache).display(),
        )
        .opt("-vis_file_dir", linx_dir.path().display())
        .opt("-plot_out", plot_dir.display())
        .opt("-data_out", dir.join("data").display())
        .opt("-circos", config.tools.circos.display())
        .opt("-ref_genome_version", config.options.ref_genome_version)
        .opt("-threads", config.resources.cpus);

    StagePlan::new(
        StageKind::LinxPlot,
        command,
        StageOutput::LinxPlot {
            dir: ArtifactRef::directory(&plot_dir),
        },
    )
    .require(PostCondition::NonEmptyDirectory(plot_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visualiser_runs_from_classpath() {
        let config = RunConfig::default();
        let identity = SampleIdentity::new("T1", "N1").unwrap();
        let dir = config.stage_dir(&identity, StageKind::LinxPlot);

        let plan = plot(&identity, &ArtifactRef::directory("/out/linx"), &config, &dir);
        let rendered = plan.command.render();

        assert!(rendered.contains(&format!("-cp /opt/hmftools/linx.jar {}", VISUALISER_CLASS)));
        assert!(rendered.contains("-vis_file_dir /out/linx"));
        assert_eq!(plan.outputs.primary().path(), dir.join("plot").as_path());
    }

    #[test]
    fn test_empty_plot_directory_violates_postcondition() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = RunConfig::default();
        let identity = SampleIdentity::new("T1", "N1").unwrap();
        let dir = temp_dir.path().join("linx_plot");
        std::fs::create_dir_all(dir.join("plot")).unwrap();

        let plan = plot(&identity, &ArtifactRef::directory("/out/linx"), &config, &dir);
        assert_eq!(
            plan.violated_postcondition(),
            Some(&PostCondition::NonEmptyDirectory(dir.join("plot")))
        );

        std::fs::write(dir.join("plot").join("circos.png"), "PNG").unwrap();
        assert!(plan.violated_postcondition().is_none());
    }
}
