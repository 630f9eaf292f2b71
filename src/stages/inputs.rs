// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Typed stage inputs, built from join tuples

use std::fmt;

use super::StageOutput;
use crate::errors::GplError;
use crate::join::{Joined, SlotSet};
use crate::model::{ArtifactRef, SampleIdentity};

/// Tumour and normal alignments with their indexes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentPair {
    pub tumour_bam: ArtifactRef,
    pub tumour_bai: ArtifactRef,
    pub normal_bam: ArtifactRef,
    pub normal_bai: ArtifactRef,
}

impl AlignmentPair {
    /// Number of positions in the interleave join
    pub const ARITY: usize = 4;

    /// Fragments in interleave order: tumour BAM, tumour index, normal BAM, normal index
    pub fn into_fragments(self) -> [ArtifactRef; 4] {
        [self.tumour_bam, self.tumour_bai, self.normal_bam, self.normal_bai]
    }
}

impl TryFrom<Vec<ArtifactRef>> for AlignmentPair {
    type Error = GplError;

    fn try_from(tuple: Vec<ArtifactRef>) -> Result<Self, Self::Error> {
        let len = tuple.len();
        let [tumour_bam, tumour_bai, normal_bam, normal_bai]: [ArtifactRef; 4] =
            tuple.try_into().map_err(|_| GplError::InvalidTuple {
                target: "alignments".into(),
                reason: format!("expected {} fragments, got {}", Self::ARITY, len),
            })?;

        Ok(Self {
            tumour_bam,
            tumour_bai,
            normal_bam,
            normal_bai,
        })
    }
}

/// Slots of the PURPLE join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PurpleSlot {
    Amber,
    Cobalt,
    StructuralVariants,
    SmallVariants,
}

impl SlotSet for PurpleSlot {
    fn all() -> &'static [Self] {
        &[
            Self::Amber,
            Self::Cobalt,
            Self::StructuralVariants,
            Self::SmallVariants,
        ]
    }
}

impl fmt::Display for PurpleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Amber => "amber",
            Self::Cobalt => "cobalt",
            Self::StructuralVariants => "structural_variants",
            Self::SmallVariants => "small_variants",
        };
        write!(f, "{}", name)
    }
}

/// Everything PURPLE consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurpleInputs {
    pub amber_dir: ArtifactRef,
    pub cobalt_dir: ArtifactRef,
    pub sv_filtered: ArtifactRef,
    /// Used by PURPLE for SV recovery
    pub sv_unfiltered: ArtifactRef,
    /// Possibly the no-file sentinel
    pub small_variants: ArtifactRef,
}

fn wrong_slot(target: &str, slot: impl fmt::Display, got: Option<&StageOutput>) -> GplError {
    GplError::InvalidTuple {
        target: target.into(),
        reason: match got {
            Some(output) => format!("slot '{}' holds unexpected {:?}", slot, output),
            None => format!("slot '{}' is empty", slot),
        },
    }
}

impl TryFrom<Joined<SampleIdentity, PurpleSlot, StageOutput>> for PurpleInputs {
    type Error = GplError;

    fn try_from(mut joined: Joined<SampleIdentity, PurpleSlot, StageOutput>) -> Result<Self, Self::Error> {
        let amber_dir = match joined.take(PurpleSlot::Amber) {
            Some(StageOutput::Amber { dir }) => dir,
            other => return Err(wrong_slot("purple_inputs", PurpleSlot::Amber, other.as_ref())),
        };
        let cobalt_dir = match joined.take(PurpleSlot::Cobalt) {
            Some(StageOutput::Cobalt { dir }) => dir,
            other => return Err(wrong_slot("purple_inputs", PurpleSlot::Cobalt, other.as_ref())),
        };
        let (sv_filtered, sv_unfiltered) = match joined.take(PurpleSlot::StructuralVariants) {
            Some(StageOutput::FilteredSv {
                filtered,
                unfiltered,
            }) => (filtered, unfiltered),
            other => {
                return Err(wrong_slot(
                    "purple_inputs",
                    PurpleSlot::StructuralVariants,
                    other.as_ref(),
                ))
            }
        };
        let small_variants = match joined.take(PurpleSlot::SmallVariants) {
            Some(StageOutput::SmallVariants { vcf }) => vcf,
            other => {
                return Err(wrong_slot(
                    "purple_inputs",
                    PurpleSlot::SmallVariants,
                    other.as_ref(),
                ))
            }
        };

        Ok(Self {
            amber_dir,
            cobalt_dir,
            sv_filtered,
            sv_unfiltered,
            small_variants,
        })
    }
}

/// Slots of the report join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReportSlot {
    Purple,
    Linx,
    Plots,
}

impl SlotSet for ReportSlot {
    fn all() -> &'static [Self] {
        &[Self::Purple, Self::Linx, Self::Plots]
    }
}

impl fmt::Display for ReportSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Purple => "purple",
            Self::Linx => "linx",
            Self::Plots => "plots",
        };
        write!(f, "{}", name)
    }
}

/// Everything the report generator consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportInputs {
    pub purple_dir: ArtifactRef,
    pub purple_sv_vcf: ArtifactRef,
    pub linx_dir: ArtifactRef,
    pub plot_dir: ArtifactRef,
}

impl TryFrom<Joined<SampleIdentity, ReportSlot, StageOutput>> for ReportInputs {
    type Error = GplError;

    fn try_from(mut joined: Joined<SampleIdentity, ReportSlot, StageOutput>) -> Result<Self, Self::Error> {
        let (purple_dir, purple_sv_vcf) = match joined.take(ReportSlot::Purple) {
            Some(StageOutput::Purple { dir, sv_vcf, .. }) => (dir, sv_vcf),
            other => return Err(wrong_slot("report_inputs", ReportSlot::Purple, other.as_ref())),
        };
        let linx_dir = match joined.take(ReportSlot::Linx) {
            Some(StageOutput::Linx { dir }) => dir,
            other => return Err(wrong_slot("report_inputs", ReportSlot::Linx, other.as_ref())),
        };
        let plot_dir = match joined.take(ReportSlot::Plots) {
            Some(StageOutput::LinxPlot { dir }) => dir,
            other => return Err(wrong_slot("report_inputs", ReportSlot::Plots, other.as_ref())),
        };

        Ok(Self {
            purple_dir,
            purple_sv_vcf,
            linx_dir,
            plot_dir,
        })
    }
}

/// Inputs to one stage invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageInputs {
    Alignments(AlignmentPair),
    SvCalls {
        calls: ArtifactRef,
    },
    SvMerge {
        calls: ArtifactRef,
        /// Auxiliary tumour SV calls, possibly the sentinel
        auxiliary: ArtifactRef,
    },
    Purple(PurpleInputs),
    Linx {
        purple_dir: ArtifactRef,
        sv_vcf: ArtifactRef,
    },
    LinxPlot {
        linx_dir: ArtifactRef,
    },
    Report(ReportInputs),
}

impl StageInputs {
    /// Input artifacts in fingerprint order
    pub fn artifacts(&self) -> Vec<&ArtifactRef> {
        match self {
            Self::Alignments(pair) => vec![
                &pair.tumour_bam,
                &pair.tumour_bai,
                &pair.normal_bam,
                &pair.normal_bai,
            ],
            Self::SvCalls { calls } => vec![calls],
            Self::SvMerge { calls, auxiliary } => vec![calls, auxiliary],
            Self::Purple(inputs) => vec![
                &inputs.amber_dir,
                &inputs.cobalt_dir,
                &inputs.sv_filtered,
                &inputs.sv_unfiltered,
                &inputs.small_variants,
            ],
            Self::Linx { purple_dir, sv_vcf } => vec![purple_dir, sv_vcf],
            Self::LinxPlot { linx_dir } => vec![linx_dir],
            Self::Report(inputs) => vec![
                &inputs.purple_dir,
                &inputs.purple_sv_vcf,
                &inputs.linx_dir,
                &inputs.plot_dir,
            ],
        }
    }

    /// Short description for error messages
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Alignments(_) => "alignment",
            Self::SvCalls { .. } => "SV call",
            Self::SvMerge { .. } => "SV merge",
            Self::Purple(_) => "PURPLE",
            Self::Linx { .. } => "LINX",
            Self::LinxPlot { .. } => "LINX plot",
            Self::Report(_) => "report",
        }
    }
}
