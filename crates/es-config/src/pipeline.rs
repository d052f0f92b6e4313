//! Pipeline configuration types.
//!
//! A pipeline file has three sections:
//! - `probe`: which domain to aggregate and how to partition it
//! - `model`: which curve to fit and how
//! - `thresholds`: bounds used by estimate selection

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use es_common::LabelSpec;
use es_math::Loss;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::validate::ValidationError;

/// Complete pipeline configuration.
///
/// Unknown keys are rejected in every section so that a misspelled or
/// unsupported dimension fails at load time.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub schema_version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub thresholds: Thresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            description: None,
            probe: ProbeConfig::default(),
            model: ModelConfig::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a pipeline configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse a pipeline configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }
}

/// Clinical data domain a probe aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProbeDomain {
    #[default]
    Visit,
    Note,
    Condition,
    Biology,
}

impl ProbeDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeDomain::Visit => "visit",
            ProbeDomain::Note => "note",
            ProbeDomain::Condition => "condition",
            ProbeDomain::Biology => "biology",
        }
    }

    /// Algorithms available for this domain.
    pub fn algorithms(&self) -> &'static [PredictorAlgorithm] {
        match self {
            ProbeDomain::Visit => &[PredictorAlgorithm::PerVisit],
            ProbeDomain::Note => &[PredictorAlgorithm::PerVisit, PredictorAlgorithm::PerNote],
            ProbeDomain::Condition => &[
                PredictorAlgorithm::PerVisit,
                PredictorAlgorithm::PerCondition,
            ],
            ProbeDomain::Biology => &[
                PredictorAlgorithm::PerVisit,
                PredictorAlgorithm::PerMeasurement,
            ],
        }
    }

    pub fn supports(&self, algorithm: PredictorAlgorithm) -> bool {
        self.algorithms().contains(&algorithm)
    }
}

impl std::fmt::Display for ProbeDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Completeness predictor algorithm, named after what is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PredictorAlgorithm {
    #[default]
    PerVisit,
    PerNote,
    PerCondition,
    PerMeasurement,
}

impl PredictorAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictorAlgorithm::PerVisit => "per_visit",
            PredictorAlgorithm::PerNote => "per_note",
            PredictorAlgorithm::PerCondition => "per_condition",
            PredictorAlgorithm::PerMeasurement => "per_measurement",
        }
    }
}

impl std::fmt::Display for PredictorAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Robust maximum used by per-entity-normalized completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Normalizer {
    /// Plain maximum of the monthly counts.
    #[default]
    Max,
    /// 99th percentile of the monthly counts; ratios are clipped to 1.
    P99,
}

/// Probe section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    #[serde(default)]
    pub domain: ProbeDomain,

    #[serde(default)]
    pub algorithm: PredictorAlgorithm,

    /// First month included.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// First month excluded.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    /// Levels to aggregate at; empty means every level.
    #[serde(default)]
    pub care_site_levels: Vec<String>,

    #[serde(default)]
    pub care_site_ids: Vec<i64>,

    #[serde(default)]
    pub care_site_short_names: Vec<String>,

    #[serde(default)]
    pub stay_types: Option<LabelSpec>,

    /// Where the patient came from (visit provenance).
    #[serde(default)]
    pub provenance_sources: Option<LabelSpec>,

    /// Stay source (MCO, SSR, psychiatry...).
    #[serde(default)]
    pub stay_sources: Option<LabelSpec>,

    /// Named groups of care sites, matched on the visit's care site short name.
    #[serde(default)]
    pub care_sites_sets: Option<LabelSpec>,

    /// Patient gender, read from the person table.
    #[serde(default)]
    pub gender_source_values: Option<LabelSpec>,

    /// Age bounds, in years at visit start, e.g. `[18, 64]`.
    #[serde(default)]
    pub age_ranges: Option<Vec<u32>>,

    /// Length-of-stay bounds, in days, e.g. `[1, 30]`.
    #[serde(default)]
    pub length_of_stays: Option<Vec<f64>>,

    #[serde(default)]
    pub note_types: Option<LabelSpec>,

    #[serde(default)]
    pub diag_types: Option<LabelSpec>,

    #[serde(default)]
    pub condition_types: Option<LabelSpec>,

    #[serde(default)]
    pub source_systems: Option<LabelSpec>,

    #[serde(default)]
    pub concepts_sets: Option<LabelSpec>,

    #[serde(default)]
    pub normalizer: Normalizer,
}

impl ProbeConfig {
    /// Every configured label spec with its dimension name.
    pub fn label_specs(&self) -> Vec<(&'static str, &LabelSpec)> {
        [
            ("stay_type", &self.stay_types),
            ("provenance_source", &self.provenance_sources),
            ("stay_source", &self.stay_sources),
            ("care_sites_set", &self.care_sites_sets),
            ("gender_source_value", &self.gender_source_values),
            ("note_type", &self.note_types),
            ("diag_type", &self.diag_types),
            ("condition_type", &self.condition_types),
            ("source_system", &self.source_systems),
            ("concepts_set", &self.concepts_sets),
        ]
        .into_iter()
        .filter_map(|(name, spec)| spec.as_ref().map(|s| (name, s)))
        .collect()
    }

    /// Names of every configured dimension, label and binned alike.
    pub fn dimension_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.label_specs().into_iter().map(|(name, _)| name).collect();
        if self.age_ranges.is_some() {
            names.push("age_range");
        }
        if self.length_of_stays.is_some() {
            names.push("length_of_stay");
        }
        names
    }
}

/// Parametric curve family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CurveShape {
    /// `c0` from `t0` onward, 0 before.
    #[default]
    Step,
    /// `c0` between `t0` and `t1` (both included), 0 outside.
    Rectangle,
}

impl CurveShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurveShape::Step => "step",
            CurveShape::Rectangle => "rectangle",
        }
    }

    /// Metric reported when none is configured.
    pub fn default_metric(&self) -> MetricName {
        match self {
            CurveShape::Step => MetricName::ErrorAfterT0,
            CurveShape::Rectangle => MetricName::ErrorBetweenT0T1,
        }
    }
}

impl std::fmt::Display for CurveShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coefficient estimation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FitStrategy {
    #[default]
    LossMinimization,
    Quantile,
}

impl FitStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitStrategy::LossMinimization => "loss_minimization",
            FitStrategy::Quantile => "quantile",
        }
    }

    pub fn supports(&self, shape: CurveShape) -> bool {
        match self {
            FitStrategy::LossMinimization => true,
            FitStrategy::Quantile => shape == CurveShape::Step,
        }
    }
}

impl std::fmt::Display for FitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named error metric.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    /// Mean loss over every observed month.
    Error,
    /// Mean loss over months at or after `t0`.
    ErrorAfterT0,
    /// Mean loss over months between `t0` and `t1`, both included.
    ErrorBetweenT0T1,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Error => "error",
            MetricName::ErrorAfterT0 => "error_after_t0",
            MetricName::ErrorBetweenT0T1 => "error_between_t0_t1",
        }
    }
}

impl std::fmt::Display for MetricName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MetricName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(MetricName::Error),
            "error_after_t0" => Ok(MetricName::ErrorAfterT0),
            "error_between_t0_t1" => Ok(MetricName::ErrorBetweenT0T1),
            _ => Err(format!("unknown metric: {}", s)),
        }
    }
}

/// Model section.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    #[serde(default)]
    pub shape: CurveShape,

    #[serde(default)]
    pub strategy: FitStrategy,

    #[serde(default)]
    pub loss: Loss,

    /// Metrics to compute; empty means the shape's default metric.
    #[serde(default)]
    pub metrics: Vec<MetricName>,

    /// Quantile used by the quantile strategy.
    #[serde(default = "default_quantile")]
    pub quantile: f64,

    /// Minimum plateau width, in months, for rectangle fitting.
    #[serde(default = "default_min_rect_month_width")]
    pub min_rect_month_width: usize,

    /// First month used for fitting.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// First month excluded from fitting.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

fn default_quantile() -> f64 {
    0.8
}

fn default_min_rect_month_width() -> usize {
    3
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            shape: CurveShape::default(),
            strategy: FitStrategy::default(),
            loss: Loss::default(),
            metrics: Vec::new(),
            quantile: default_quantile(),
            min_rect_month_width: default_min_rect_month_width(),
            start_date: None,
            end_date: None,
        }
    }
}

impl ModelConfig {
    /// Configured metrics, or the shape default when none are listed.
    pub fn effective_metrics(&self) -> Vec<MetricName> {
        if self.metrics.is_empty() {
            vec![self.shape.default_metric()]
        } else {
            let mut metrics = self.metrics.clone();
            metrics.sort();
            metrics.dedup();
            metrics
        }
    }
}

/// Bounds used to select estimates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    /// Keep estimates whose onset is at or before this month.
    #[serde(default)]
    pub max_t0: Option<NaiveDate>,

    /// Keep estimates whose plateau is at least this value.
    #[serde(default)]
    pub min_c0: Option<f64>,

    /// Keep estimates whose metric is at most this value.
    #[serde(default)]
    pub max_metric: BTreeMap<MetricName, f64>,
}

impl Thresholds {
    pub fn is_empty(&self) -> bool {
        self.max_t0.is_none() && self.min_c0.is_none() && self.max_metric.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = PipelineConfig::from_json(r#"{"schema_version": "1.0.0"}"#).unwrap();
        assert_eq!(cfg.probe.domain, ProbeDomain::Visit);
        assert_eq!(cfg.probe.algorithm, PredictorAlgorithm::PerVisit);
        assert_eq!(cfg.model.shape, CurveShape::Step);
        assert_eq!(cfg.model.strategy, FitStrategy::LossMinimization);
        assert_eq!(cfg.model.quantile, 0.8);
        assert_eq!(cfg.model.min_rect_month_width, 3);
        assert!(cfg.thresholds.is_empty());
    }

    #[test]
    fn test_full_config_parses() {
        let json = r#"{
            "schema_version": "1.0.0",
            "probe": {
                "domain": "note",
                "algorithm": "per_note",
                "start_date": "2019-01-01",
                "end_date": "2021-01-01",
                "care_site_levels": ["Hospital", "Pôle/DMU"],
                "stay_types": {"Urg": "urgence", "All": ".*"},
                "note_types": "CRH",
                "normalizer": "p99"
            },
            "model": {
                "shape": "rectangle",
                "loss": "l1",
                "metrics": ["error", "error_between_t0_t1"]
            },
            "thresholds": {
                "max_t0": "2020-01-01",
                "min_c0": 0.5,
                "max_metric": {"error_between_t0_t1": 0.1}
            }
        }"#;
        let cfg = PipelineConfig::from_json(json).unwrap();
        assert_eq!(cfg.probe.domain, ProbeDomain::Note);
        assert_eq!(cfg.probe.normalizer, Normalizer::P99);
        assert_eq!(cfg.probe.label_specs().len(), 2);
        assert_eq!(cfg.model.loss, Loss::L1);
        assert_eq!(
            cfg.thresholds.max_metric.get(&MetricName::ErrorBetweenT0T1),
            Some(&0.1)
        );
    }

    #[test]
    fn test_effective_metrics() {
        let mut model = ModelConfig::default();
        assert_eq!(model.effective_metrics(), vec![MetricName::ErrorAfterT0]);
        model.shape = CurveShape::Rectangle;
        assert_eq!(model.effective_metrics(), vec![MetricName::ErrorBetweenT0T1]);
        model.metrics = vec![MetricName::ErrorAfterT0, MetricName::Error, MetricName::Error];
        assert_eq!(
            model.effective_metrics(),
            vec![MetricName::Error, MetricName::ErrorAfterT0]
        );
    }

    #[test]
    fn test_domain_algorithms() {
        assert!(ProbeDomain::Note.supports(PredictorAlgorithm::PerNote));
        assert!(!ProbeDomain::Visit.supports(PredictorAlgorithm::PerNote));
        assert!(FitStrategy::Quantile.supports(CurveShape::Step));
        assert!(!FitStrategy::Quantile.supports(CurveShape::Rectangle));
    }

    #[test]
    fn test_binned_and_visit_dimensions_parse() {
        let json = r#"{
            "schema_version": "1.0.0",
            "probe": {
                "stay_types": "hospit",
                "provenance_sources": {"Urg": "service d'urgence"},
                "care_sites_sets": {"Pediatrics": "debre|necker"},
                "age_ranges": [18, 64],
                "length_of_stays": [1, 30]
            }
        }"#;
        let cfg = PipelineConfig::from_json(json).unwrap();
        assert_eq!(cfg.probe.age_ranges, Some(vec![18, 64]));
        assert_eq!(
            cfg.probe.dimension_names(),
            vec![
                "stay_type",
                "provenance_source",
                "care_sites_set",
                "age_range",
                "length_of_stay"
            ]
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        for json in [
            r#"{"schema_version": "1.0.0", "probe": {"specialties_sets": {"ICU": "REA"}}}"#,
            r#"{"schema_version": "1.0.0", "model": {"shapes": "step"}}"#,
            r#"{"schema_version": "1.0.0", "thresholds": {"max_t1": "2020-01-01"}}"#,
            r#"{"schema_version": "1.0.0", "probes": {}}"#,
        ] {
            let err = PipelineConfig::from_json(json).unwrap_err();
            assert_eq!(err.code(), 61, "accepted: {}", json);
        }
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = PipelineConfig::from_json("{").unwrap_err();
        assert_eq!(err.code(), 61);
    }
}
