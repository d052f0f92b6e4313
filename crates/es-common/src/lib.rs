//! Shared types for the completeness pipeline.
//!
//! This crate provides foundational types shared across the workspace:
//! - Error taxonomy with stable codes
//! - Care site and visit identity types
//! - Care-site levels and reference records
//! - Label mappings for categorical dimensions
//! - Calendar-month bucketing
//! - Output format specifications

pub mod care_site;
pub mod error;
pub mod id;
pub mod labels;
pub mod month;
pub mod output;

pub use care_site::{CareSite, CareSiteLevel};
pub use error::{Error, ErrorCategory, Result};
pub use id::{CareSiteId, RunId, VisitId};
pub use labels::{LabelMapping, LabelRule, LabelSpec, ALL_LABEL};
pub use output::OutputFormat;

/// Schema version of the flat tables and JSON envelopes produced by the pipeline.
pub const SCHEMA_VERSION: &str = "1.0.0";
