// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Error types
//!
//! Run-level problems (bad configuration, unreadable sample sheets, cache
//! corruption) are `GplError`s. Per-identity failures during a run are values
//! (`FailureCause`) recorded in the identity's outcome, so one failing sample
//! never aborts its siblings.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for gplflow operations
pub type GplResult<T> = Result<T, GplError>;

/// Main error type for gplflow
#[derive(Error, Debug, Diagnostic)]
pub enum GplError {
    // ─────────────────────────────────────────────────────────────────────────
    // Tool Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Tool '{tool}' execution failed: {error}")]
    #[diagnostic(code(gplflow::tool_execution_failed))]
    ToolExecutionFailed {
        tool: String,
        error: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(gplflow::config_not_found),
        help("Pass a configuration with '--config' or create gplflow.yaml in the working directory")
    )]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid configuration: {reason}")]
    #[diagnostic(code(gplflow::invalid_config))]
    InvalidConfig {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Sample sheet not found: {path}")]
    #[diagnostic(code(gplflow::sample_sheet_not_found))]
    SampleSheetNotFound { path: PathBuf },

    #[error("Invalid sample '{sample}': {reason}")]
    #[diagnostic(
        code(gplflow::invalid_sample),
        help("Sample names must start with an alphanumeric and contain only letters, numbers, '-' and '_'")
    )]
    InvalidSample { sample: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Graph Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Circular dependency detected")]
    #[diagnostic(code(gplflow::circular_dependency))]
    CircularDependency { nodes: Vec<String> },

    #[error("Stage '{stage}' cannot move from {from} to {to}")]
    #[diagnostic(code(gplflow::invalid_transition))]
    InvalidTransition {
        stage: String,
        from: String,
        to: String,
    },

    #[error("Malformed input tuple for '{target}': {reason}")]
    #[diagnostic(code(gplflow::invalid_tuple))]
    InvalidTuple { target: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Gate Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Could not evaluate records in '{path}': {message}")]
    #[diagnostic(code(gplflow::gate_error))]
    Gate { path: PathBuf, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(gplflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(gplflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Cache Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Cache error: {message}")]
    #[diagnostic(code(gplflow::cache_error))]
    CacheError { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(gplflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(gplflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(gplflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(gplflow::toml_error))]
    Toml { message: String },

    #[error("Internal error: {message}")]
    #[diagnostic(code(gplflow::internal))]
    Internal { message: String },
}

impl From<std::io::Error> for GplError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for GplError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for GplError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for GplError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<tokio::task::JoinError> for GplError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal {
            message: format!("worker task did not complete: {}", e),
        }
    }
}

impl GplError {
    /// Wrap an error reading a specific path
    pub fn read_failed(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::FileReadError {
            path: path.to_path_buf(),
            error: error.to_string(),
        }
    }

    /// Wrap an error writing a specific path
    pub fn write_failed(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::FileWriteError {
            path: path.to_path_buf(),
            error: error.to_string(),
        }
    }
}
