//! Configuration loading for es-core.
//!
//! This module handles:
//! - Resolving pipeline.json (CLI > env > XDG > system > defaults)
//! - Parsing and version checking
//! - Semantic validation via es-config
//! - Snapshots recorded next to pipeline outputs

pub use es_config::validate::ValidationError;
pub use es_config::{
    ConfigPaths, ConfigSnapshot, ConfigSource, CurveShape, FitStrategy, MetricName, ModelConfig,
    Normalizer, PipelineConfig, PredictorAlgorithm, ProbeConfig, ProbeDomain, Thresholds,
    CONFIG_SCHEMA_VERSION,
};

use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::logging::event_names;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl From<ConfigError> for es_common::Error {
    fn from(err: ConfigError) -> Self {
        es_common::Error::Config(err.to_string())
    }
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub pipeline: PipelineConfig,
    pub paths: ConfigPaths,
    /// Raw file content (None when using defaults).
    pub raw: Option<String>,
}

impl ResolvedConfig {
    /// Create a config snapshot for persisted artifacts.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::new(&self.pipeline, &self.paths, self.raw.as_deref())
    }
}

/// Configuration resolution options.
#[derive(Debug, Default)]
pub struct ConfigOptions {
    /// Explicit pipeline file (highest priority).
    pub pipeline_path: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let paths = es_config::resolve_config(options.pipeline_path.as_deref());

    let Some(path) = paths.pipeline.clone() else {
        debug!(event = event_names::CONFIG_DEFAULT_USED, "no pipeline file found, using defaults");
        return Ok(ResolvedConfig {
            pipeline: PipelineConfig::default(),
            paths,
            raw: None,
        });
    };

    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }

    let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
        path: path.clone(),
        source: e,
    })?;

    let pipeline: PipelineConfig =
        serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            source: e,
        })?;

    if pipeline.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(ConfigError::VersionMismatch {
            expected: CONFIG_SCHEMA_VERSION.to_string(),
            actual: pipeline.schema_version.clone(),
        });
    }

    es_config::validate_pipeline(&pipeline)?;

    info!(
        event = event_names::CONFIG_LOADED,
        path = %path.display(),
        source = %paths.source,
        "pipeline configuration loaded"
    );

    Ok(ResolvedConfig {
        pipeline,
        paths,
        raw: Some(raw),
    })
}
