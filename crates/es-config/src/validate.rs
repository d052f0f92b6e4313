//! Configuration validation errors and semantic validation.

use chrono::NaiveDate;
use es_common::{CareSiteLevel, LabelMapping};
use thiserror::Error;

use crate::pipeline::{ModelConfig, PipelineConfig, ProbeConfig, Thresholds};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

/// Validate a pipeline configuration semantically.
pub fn validate_pipeline(config: &PipelineConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    validate_probe(&config.probe)?;
    validate_model(&config.model)?;
    validate_thresholds(&config.thresholds)?;
    Ok(())
}

/// Validate the probe section.
pub fn validate_probe(probe: &ProbeConfig) -> ValidationResult<()> {
    if !probe.domain.supports(probe.algorithm) {
        return Err(ValidationError::InvalidValue {
            field: "probe.algorithm".to_string(),
            message: format!(
                "{} is not available for the {} domain (expected one of {:?})",
                probe.algorithm,
                probe.domain,
                probe
                    .domain
                    .algorithms()
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>()
            ),
        });
    }

    validate_window("probe", probe.start_date, probe.end_date)?;

    if !probe.care_site_levels.is_empty()
        && probe
            .care_site_levels
            .iter()
            .all(|l| l.parse::<CareSiteLevel>().is_err())
    {
        return Err(ValidationError::InvalidValue {
            field: "probe.care_site_levels".to_string(),
            message: format!(
                "must include at least one of {:?}",
                CareSiteLevel::supported_names()
            ),
        });
    }

    for (dimension, spec) in probe.label_specs() {
        LabelMapping::compile(spec).map_err(|e| ValidationError::InvalidValue {
            field: format!("probe.{}", dimension),
            message: e.to_string(),
        })?;
    }

    if let Some(bounds) = &probe.age_ranges {
        let bounds: Vec<f64> = bounds.iter().map(|&b| f64::from(b)).collect();
        validate_bounds("probe.age_ranges", &bounds)?;
    }
    if let Some(bounds) = &probe.length_of_stays {
        validate_bounds("probe.length_of_stays", bounds)?;
    }

    Ok(())
}

/// Bin bounds must be non-empty, finite, non-negative and strictly increasing.
pub fn validate_bounds(field: &str, bounds: &[f64]) -> ValidationResult<()> {
    let invalid = |message: String| ValidationError::InvalidValue {
        field: field.to_string(),
        message,
    };
    if bounds.is_empty() {
        return Err(invalid("Must list at least one bound".to_string()));
    }
    if let Some(b) = bounds.iter().find(|b| !b.is_finite() || **b < 0.0) {
        return Err(invalid(format!("Bounds must be non-negative numbers, got {}", b)));
    }
    if bounds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(invalid(format!(
            "Bounds must be strictly increasing, got {:?}",
            bounds
        )));
    }
    Ok(())
}

/// Validate the model section.
pub fn validate_model(model: &ModelConfig) -> ValidationResult<()> {
    if !(0.0..=1.0).contains(&model.quantile) {
        return Err(ValidationError::InvalidValue {
            field: "model.quantile".to_string(),
            message: format!("Must be in [0, 1], got {}", model.quantile),
        });
    }

    if model.min_rect_month_width == 0 {
        return Err(ValidationError::InvalidValue {
            field: "model.min_rect_month_width".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }

    if !model.strategy.supports(model.shape) {
        return Err(ValidationError::SemanticError(format!(
            "strategy {} cannot fit the {} shape",
            model.strategy, model.shape
        )));
    }

    validate_window("model", model.start_date, model.end_date)
}

/// Validate selection thresholds.
pub fn validate_thresholds(thresholds: &Thresholds) -> ValidationResult<()> {
    if let Some(min_c0) = thresholds.min_c0 {
        if !min_c0.is_finite() || min_c0 < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "thresholds.min_c0".to_string(),
                message: format!("Must be a non-negative number, got {}", min_c0),
            });
        }
    }

    for (metric, bound) in &thresholds.max_metric {
        if !bound.is_finite() || *bound < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: format!("thresholds.max_metric.{}", metric),
                message: format!("Must be a non-negative number, got {}", bound),
            });
        }
    }

    Ok(())
}

fn validate_window(
    section: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> ValidationResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(ValidationError::InvalidValue {
                field: format!("{}.start_date", section),
                message: format!("start {} must be before end {}", start, end),
            });
        }
    }
    Ok(())
}
