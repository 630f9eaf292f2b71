// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! HTML report generation

use std::path::Path;

use super::{sample_file, PostCondition, ReportInputs, StageKind, StageOutput, StagePlan};
use crate::executors::ToolCommand;
use crate::model::{ArtifactRef, SampleIdentity};
use crate::pipeline::RunConfig;

pub(super) fn plan(identity: &SampleIdentity, inputs: &ReportInputs, config: &RunConfig, dir: &Path) -> StagePlan {
    let report = sample_file(dir, identity, ".gpl_report.html");

    let command = ToolCommand::new(config.tools.report.to_string_lossy(), dir)
        .opt("--tumour_name", identity.tumour_name())
        .opt("--normal_name", identity.normal_name())
        .opt("--purple_dir", inputs.purple_dir.path().display())
        .opt("--purple_sv_vcf", inputs.purple_sv_vcf.path().display())
        .opt("--linx_dir", inputs.linx_dir.path().display())
        .opt("--plot_dir", inputs.plot_dir.path().display())
        .opt("--output_fp", report.display());

    StagePlan::new(
        StageKind::Report,
        command,
        StageOutput::Report {
            report: ArtifactRef::file(&report),
        },
    )
    .require(PostCondition::NonEmptyFile(report))
}
