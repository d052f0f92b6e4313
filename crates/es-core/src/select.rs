//! Threshold selection over fitted estimates.

use es_config::Thresholds;
use tracing::debug;

use crate::logging::event_names;
use crate::model::{EstimateRow, Estimates};

/// True when `row` satisfies every configured bound.
///
/// A coefficient or metric that is missing fails any bound on it.
pub fn passes(row: &EstimateRow, thresholds: &Thresholds) -> bool {
    if let Some(max_t0) = thresholds.max_t0 {
        if !row.coefficients.t0.is_some_and(|t0| t0 <= max_t0) {
            return false;
        }
    }
    if let Some(min_c0) = thresholds.min_c0 {
        if row.coefficients.c0 < min_c0 {
            return false;
        }
    }
    thresholds
        .max_metric
        .iter()
        .all(|(name, bound)| row.metric(*name).is_some_and(|v| v <= *bound))
}

pub fn select<'a>(estimates: &'a Estimates, thresholds: &Thresholds) -> Vec<&'a EstimateRow> {
    let selected: Vec<&EstimateRow> = estimates
        .rows
        .iter()
        .filter(|row| passes(row, thresholds))
        .collect();
    debug!(
        event = event_names::MODEL_ESTIMATES_FILTERED,
        total = estimates.len(),
        selected = selected.len(),
        "estimates selected"
    );
    selected
}
