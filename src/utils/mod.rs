// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Utility modules
//!
//! Terminal helpers for the gplflow CLI.

pub mod log_writer;
pub mod spinner;

pub use log_writer::{log_writer, route_logs_around, LogRouting};
pub use spinner::*;
