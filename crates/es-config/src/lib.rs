//! Pipeline configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for pipeline.json
//! - Config resolution (CLI → env → XDG → system → defaults)
//! - Semantic validation
//! - Config snapshots recorded alongside pipeline outputs

pub mod pipeline;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use pipeline::{
    CurveShape, FitStrategy, MetricName, ModelConfig, Normalizer, PipelineConfig, PredictorAlgorithm,
    ProbeConfig, ProbeDomain, Thresholds,
};
pub use resolve::{resolve_config, ConfigPaths, ConfigSource};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_bounds, validate_pipeline, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
