//! Error types for the completeness pipeline.
//!
//! Every error carries:
//! - A stable numeric code for machine parsing
//! - A category used to pick the CLI exit code
//! - A recoverability hint
//!
//! Data degeneracy (zero denominators, empty metric regions, unknown
//! care-site names) is never an error. Those cases are absorbed by the
//! numeric conventions of the probe and the model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid configuration, rejected before any work is done.
    Config,
    /// Input tables missing or structurally invalid.
    Data,
    /// Lifecycle misuse of a probe or model.
    Model,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Model => write!(f, "model"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid pattern {pattern:?} for label {label:?}: {message}")]
    InvalidLabelPattern {
        label: String,
        pattern: String,
        message: String,
    },

    #[error("quantile must be in [0, 1], got {0}")]
    InvalidQuantile(f64),

    #[error("care site levels must include at least one of {supported:?}, got {requested:?}")]
    NoCareSiteLevel {
        requested: Vec<String>,
        supported: Vec<String>,
    },

    #[error("invalid date window: start {start} is not before end {end}")]
    InvalidDateWindow { start: String, end: String },

    #[error("algorithm {algorithm} is not available for the {domain} domain")]
    UnsupportedAlgorithm { domain: String, algorithm: String },

    #[error("fit strategy {strategy} does not support the {shape} shape")]
    UnsupportedStrategy { strategy: String, shape: String },

    // Data errors (20-29)
    #[error("required table {0} is missing from the dataset")]
    MissingTable(String),

    #[error("care site hierarchy has a cycle through care site {care_site_id}")]
    HierarchyCycle { care_site_id: i64 },

    #[error("invalid record in {table}: {message}")]
    InvalidRecord { table: String, message: String },

    // Model lifecycle errors (30-39)
    #[error("model is not fitted; call fit before reading estimates or predicting")]
    NotFitted,

    #[error("probe has not been computed; call compute first")]
    NotComputed,

    #[error("probe label dimensions {actual:?} do not match the fitted dimensions {expected:?}")]
    IncompatibleProbe {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    // I/O errors (40-49)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Data errors
    /// - 30-39: Model lifecycle errors
    /// - 40-49: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidLabelPattern { .. } => 11,
            Error::InvalidQuantile(_) => 12,
            Error::NoCareSiteLevel { .. } => 13,
            Error::InvalidDateWindow { .. } => 14,
            Error::UnsupportedAlgorithm { .. } => 15,
            Error::UnsupportedStrategy { .. } => 16,
            Error::MissingTable(_) => 20,
            Error::HierarchyCycle { .. } => 21,
            Error::InvalidRecord { .. } => 22,
            Error::NotFitted => 30,
            Error::NotComputed => 31,
            Error::IncompatibleProbe { .. } => 32,
            Error::Io(_) => 40,
            Error::Json(_) => 41,
            Error::Storage(_) => 42,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_)
            | Error::InvalidLabelPattern { .. }
            | Error::InvalidQuantile(_)
            | Error::NoCareSiteLevel { .. }
            | Error::InvalidDateWindow { .. }
            | Error::UnsupportedAlgorithm { .. }
            | Error::UnsupportedStrategy { .. } => ErrorCategory::Config,

            Error::MissingTable(_) | Error::HierarchyCycle { .. } | Error::InvalidRecord { .. } => {
                ErrorCategory::Data
            }

            Error::NotFitted | Error::NotComputed | Error::IncompatibleProbe { .. } => {
                ErrorCategory::Model
            }

            Error::Io(_) | Error::Json(_) | Error::Storage(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether the caller can fix this by changing its inputs.
    ///
    /// Lifecycle errors are programming errors and are never recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::Config | ErrorCategory::Data | ErrorCategory::Io => true,
            ErrorCategory::Model => false,
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Config => "Configuration Error",
            ErrorCategory::Data => "Input Data Error",
            ErrorCategory::Model => "Pipeline Usage Error",
            ErrorCategory::Io => "I/O Error",
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::InvalidLabelPattern { .. } => {
                "Label patterns are regular expressions; escape special characters or run 'edsteva check'."
            }
            Error::NoCareSiteLevel { .. } => {
                "Use one of Hospital, Pole, UF (or Hôpital, Pôle/DMU, Unité Fonctionnelle (UF))."
            }
            Error::MissingTable(_) => {
                "Add the table to the dataset JSON or pick an algorithm that does not need it."
            }
            Error::NotFitted => "Run 'edsteva fit' and pass the resulting model file.",
            Error::NotComputed => "Run 'edsteva compute' and pass the resulting probe file.",
            Error::IncompatibleProbe { .. } => {
                "Predict with a probe computed with the same label mappings as the fitted one."
            }
            _ => match self.category() {
                ErrorCategory::Config => "Run 'edsteva check' to validate the pipeline configuration.",
                ErrorCategory::Data => "Check the dataset tables and care site hierarchy.",
                ErrorCategory::Model => "Check the order of pipeline calls.",
                ErrorCategory::Io => "Check paths, permissions, and JSON syntax of the input files.",
            },
        }
    }
}
