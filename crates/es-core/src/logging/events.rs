//! Structured event vocabulary.
//!
//! Every event carries the run id and the pipeline stage it belongs to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Reading input tables.
    Load,
    /// Aggregating records into a predictor.
    Compute,
    /// Restricting a predictor to care sites or dates.
    Filter,
    /// Estimating curve coefficients.
    Fit,
    /// Evaluating a fitted model on a predictor.
    Predict,
    /// Applying thresholds to estimates.
    Select,
    /// Saving and loading artifacts.
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Compute => "compute",
            Stage::Filter => "filter",
            Stage::Fit => "fit",
            Stage::Predict => "predict",
            Stage::Select => "select",
            Stage::Persist => "persist",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Standard event names, used as tracing targets.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";
    pub const RUN_FAILED: &str = "run.failed";

    // Config
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";

    // Data
    pub const DATA_LOADED: &str = "data.loaded";

    // Hierarchy
    pub const HIERARCHY_ORPHAN: &str = "hierarchy.orphan";
    pub const HIERARCHY_UNKNOWN_SHORT_NAME: &str = "hierarchy.unknown_short_name";
    pub const HIERARCHY_UNKNOWN_LEVEL: &str = "hierarchy.unknown_level";

    // Probe
    pub const PROBE_COMPUTE_STARTED: &str = "probe.compute_started";
    pub const PROBE_COMPUTE_FINISHED: &str = "probe.compute_finished";
    pub const PROBE_FILTERED: &str = "probe.filtered";
    pub const PROBE_RESET: &str = "probe.reset";

    // Model
    pub const MODEL_FIT_STARTED: &str = "model.fit_started";
    pub const MODEL_FIT_FINISHED: &str = "model.fit_finished";
    pub const MODEL_PREDICTED: &str = "model.predicted";
    pub const MODEL_ESTIMATES_FILTERED: &str = "model.estimates_filtered";

    // Persistence
    pub const ARTIFACT_SAVED: &str = "artifact.saved";
    pub const ARTIFACT_LOADED: &str = "artifact.loaded";
}

/// A structured log event for JSONL output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,
    /// Event name (e.g., "probe.compute_started").
    pub event: String,
    pub run_id: String,
    pub stage: Stage,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(
        level: Level,
        event: impl Into<String>,
        run_id: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            run_id: run_id.into(),
            stage,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a field to the event.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Context for generating events with a consistent run id.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
        }
    }

    pub fn event(
        &self,
        level: Level,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        LogEvent::new(level, event, &self.run_id, stage, message)
    }

    pub fn info(&self, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Info, event, stage, message)
    }

    pub fn warn(&self, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Warn, event, stage, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::new(
            Level::Info,
            event_names::PROBE_COMPUTE_FINISHED,
            "es-20260115-143022-a7xq",
            Stage::Compute,
            "predictor ready",
        )
        .with_field("rows", 42);

        let json = event.to_jsonl();
        assert!(json.contains(r#""event":"probe.compute_finished""#));
        assert!(json.contains(r#""level":"info""#));
        assert!(json.contains(r#""stage":"compute""#));
        assert!(json.contains(r#""rows":42"#));
    }

    #[test]
    fn test_log_context() {
        let ctx = LogContext::new("es-20260115-143022-b2c3");
        let event = ctx.warn(event_names::HIERARCHY_ORPHAN, Stage::Load, "missing parent");
        assert_eq!(event.run_id, "es-20260115-143022-b2c3");
        assert_eq!(event.level, Level::Warn);
        assert_eq!(event.stage, Stage::Load);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Fit.to_string(), "fit");
        assert_eq!(
            serde_json::to_string(&Stage::Persist).unwrap(),
            "\"persist\""
        );
    }
}
