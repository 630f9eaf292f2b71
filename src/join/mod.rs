// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Keyed stream joiners
//!
//! Producers emit `(key, slot, value)` triples in any order. A joiner holds
//! partial state per in-flight key and emits exactly one complete tuple once
//! every declared slot is filled. Filling a slot twice, or offering anything
//! for a key that already emitted, is a protocol violation: the key's partial
//! state is dropped and the key is closed until its owner retires it.

mod interleave;
mod strict;

pub use interleave::InterleaveJoiner;
pub use strict::{Joined, StrictJoiner};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Declares the slots of a strict join
pub trait SlotSet: Copy + Ord + fmt::Debug + fmt::Display + Send + 'static {
    /// Every slot that must be filled before the tuple is emitted
    fn all() -> &'static [Self];
}

/// The join points of the pipeline graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinTarget {
    /// Tumour and normal BAMs interleaved with their indexes
    Alignments,
    PurpleInputs,
    ReportInputs,
}

impl JoinTarget {
    pub fn name(self) -> &'static str {
        match self {
            Self::Alignments => "alignments",
            Self::PurpleInputs => "purple_inputs",
            Self::ReportInputs => "report_inputs",
        }
    }
}

impl fmt::Display for JoinTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Protocol violations detected by a joiner
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("'{key}' received a second value for slot '{slot}'")]
    DuplicateEmission { key: String, slot: String },

    #[error("'{key}' is closed and accepts no further values")]
    Closed { key: String },

    #[error("'{key}' offered position {position} but the join has arity {arity}")]
    PositionOutOfRange {
        key: String,
        position: usize,
        arity: usize,
    },
}

impl JoinError {
    /// Slot label carried by the error, if any
    pub fn slot(&self) -> String {
        match self {
            Self::DuplicateEmission { slot, .. } => slot.clone(),
            Self::Closed { .. } => "*".to_string(),
            Self::PositionOutOfRange { position, .. } => position.to_string(),
        }
    }
}

/// Why a key stopped accepting values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sealed {
    Emitted,
    Failed,
}
