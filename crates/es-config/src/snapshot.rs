//! Configuration snapshots for reproducibility.
//!
//! A snapshot records which configuration produced a probe or a model so
//! that persisted outputs can be traced back to their settings.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::pipeline::PipelineConfig;
use crate::resolve::ConfigPaths;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Path the configuration was loaded from.
    #[serde(default)]
    pub config_path: Option<String>,

    /// Source of the configuration.
    pub config_source: String,

    /// SHA-256 of the raw file content, when a file was loaded.
    #[serde(default)]
    pub content_hash: Option<String>,

    /// SHA-256 of the effective configuration serialized as JSON.
    pub effective_hash: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigSummary {
    pub domain: String,
    pub algorithm: String,
    pub label_dimensions: Vec<String>,
    pub shape: String,
    pub strategy: String,
    pub loss: String,
    pub metrics: Vec<String>,
}

impl ConfigSnapshot {
    /// Create a snapshot from a loaded configuration.
    pub fn new(config: &PipelineConfig, paths: &ConfigPaths, raw_json: Option<&str>) -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            config_path: paths.pipeline.as_ref().map(|p| p.display().to_string()),
            config_source: paths.source.to_string(),
            content_hash: raw_json.map(hash_content),
            effective_hash: effective_hash(config),
            summary: ConfigSummary::from_config(config),
        }
    }

    /// Create a snapshot with only defaults (no config file loaded).
    pub fn defaults_only() -> Self {
        Self::new(&PipelineConfig::default(), &ConfigPaths::default(), None)
    }

    /// Serialize snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if this snapshot describes the same effective configuration.
    pub fn matches(&self, other: &ConfigSnapshot) -> bool {
        self.effective_hash == other.effective_hash
    }

    /// Get a short identifier for this snapshot (first 12 chars of hash).
    pub fn short_id(&self) -> &str {
        &self.effective_hash[..12.min(self.effective_hash.len())]
    }
}

impl ConfigSummary {
    fn from_config(config: &PipelineConfig) -> Self {
        ConfigSummary {
            domain: config.probe.domain.to_string(),
            algorithm: config.probe.algorithm.to_string(),
            label_dimensions: config
                .probe
                .dimension_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            shape: config.model.shape.to_string(),
            strategy: config.model.strategy.to_string(),
            loss: config.model.loss.to_string(),
            metrics: config
                .model
                .effective_metrics()
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

fn effective_hash(config: &PipelineConfig) -> String {
    // Serializing plain data structs cannot fail; fall back to the debug form regardless.
    let canonical = serde_json::to_string(config).unwrap_or_else(|_| format!("{:?}", config));
    hash_content(&canonical)
}

/// Hash content with SHA-256 and return hex string.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
