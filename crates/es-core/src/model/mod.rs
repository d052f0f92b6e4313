//! Curve-fitting model.
//!
//! `Model::fit` estimates coefficients for every series of a computed
//! probe. Estimates are replaced wholesale on each fit; threshold filters
//! narrow a working copy that [`Model::reset_estimates`] restores.

pub mod estimates;
pub mod fit;
pub mod metrics;
pub mod shape;

use std::path::Path;

use chrono::NaiveDate;
use es_common::{Error, Result};
use es_config::{ModelConfig, Thresholds};
use es_store::FlatTable;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use estimates::{EstimateRow, Estimates, PredictionRow, Predictions};
pub use shape::{Coefficients, ShapeFunction};

use crate::artifact::{self, ArtifactKind};
use crate::logging::event_names;
use crate::probe::aggregate::Window;
use crate::probe::Probe;
use crate::select;

/// Window restricting the months used for fitting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FitOptions {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl FitOptions {
    pub fn from_config(config: &ModelConfig) -> Self {
        FitOptions {
            start_date: config.start_date,
            end_date: config.end_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    config: ModelConfig,
    fitted: Option<Estimates>,
    estimates: Option<Estimates>,
}

impl Model {
    /// Create an unfitted model, rejecting invalid settings up front.
    pub fn new(config: ModelConfig) -> Result<Self> {
        if !config.strategy.supports(config.shape) {
            return Err(Error::UnsupportedStrategy {
                strategy: config.strategy.to_string(),
                shape: config.shape.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&config.quantile) {
            return Err(Error::InvalidQuantile(config.quantile));
        }
        if config.min_rect_month_width < 1 {
            return Err(Error::Config(
                "min_rect_month_width must be at least 1".to_string(),
            ));
        }
        Ok(Model {
            config,
            fitted: None,
            estimates: None,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.estimates.is_some()
    }

    /// Fit every series of `probe` inside the `options` window.
    ///
    /// Series without any month in the window get no estimate.
    pub fn fit(&mut self, probe: &Probe, options: &FitOptions) -> Result<&Estimates> {
        let predictor = probe.predictor()?;
        if let (Some(start), Some(end)) = (options.start_date, options.end_date) {
            if start >= end {
                return Err(Error::InvalidDateWindow {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        let window = Window {
            start: options.start_date,
            end: options.end_date,
        };
        let metric_names = self.config.effective_metrics();

        info!(
            event = event_names::MODEL_FIT_STARTED,
            shape = %self.config.shape,
            strategy = %self.config.strategy,
            loss = %self.config.loss,
            series = predictor.num_series(),
            "fitting model"
        );

        let mut rows = Vec::new();
        for (key, series) in predictor.series() {
            let (xs, ys): (Vec<NaiveDate>, Vec<f64>) = series
                .iter()
                .filter(|r| window.contains(r.date))
                .map(|r| (r.date, r.c))
                .unzip();
            if xs.is_empty() {
                debug!(
                    care_site_id = key.care_site_id.0,
                    "no month inside the fit window, skipping series"
                );
                continue;
            }

            let coefficients = fit::fit_series(&self.config, &xs, &ys);
            let values = metric_names
                .iter()
                .map(|&m| {
                    let value = metrics::compute_metric(
                        m,
                        self.config.shape,
                        self.config.loss,
                        &coefficients,
                        &xs,
                        &ys,
                    );
                    if value.is_none() {
                        debug!(
                            care_site_id = key.care_site_id.0,
                            metric = m.as_str(),
                            "empty metric region, reporting missing value"
                        );
                    }
                    (m, value)
                })
                .collect();
            rows.push(EstimateRow {
                key: key.clone(),
                coefficients,
                metrics: values,
            });
        }

        let estimates = Estimates {
            shape: self.config.shape,
            label_dimensions: predictor.label_dimensions.clone(),
            metrics: metric_names,
            rows,
        };
        info!(
            event = event_names::MODEL_FIT_FINISHED,
            estimates = estimates.len(),
            "model fitted"
        );

        self.fitted = Some(estimates.clone());
        Ok(&*self.estimates.insert(estimates))
    }

    pub fn estimates(&self) -> Result<&Estimates> {
        self.estimates.as_ref().ok_or(Error::NotFitted)
    }

    /// Evaluate the fitted curves at every month of `probe`.
    ///
    /// Keys without an estimate produce no row.
    pub fn predict(&self, probe: &Probe) -> Result<Predictions> {
        let estimates = self.estimates()?;
        let predictor = probe.predictor()?;
        if predictor.label_dimensions != estimates.label_dimensions {
            return Err(Error::IncompatibleProbe {
                expected: estimates.label_dimensions.clone(),
                actual: predictor.label_dimensions.clone(),
            });
        }

        let mut rows = Vec::with_capacity(predictor.len());
        let mut skipped = 0usize;
        for (key, series) in predictor.series() {
            let Some(estimate) = estimates.get(key) else {
                skipped += 1;
                continue;
            };
            for row in series {
                rows.push(PredictionRow {
                    key: key.clone(),
                    date: row.date,
                    c: row.c,
                    c_hat: estimates.shape.value_at(&estimate.coefficients, row.date),
                });
            }
        }
        if skipped > 0 {
            debug!(skipped, "series without estimates skipped");
        }
        info!(
            event = event_names::MODEL_PREDICTED,
            rows = rows.len(),
            "predictions computed"
        );

        Ok(Predictions {
            label_dimensions: estimates.label_dimensions.clone(),
            rows,
        })
    }

    /// Keep only estimates passing `thresholds`.
    pub fn filter_estimates(&mut self, thresholds: &Thresholds) -> Result<()> {
        let estimates = self.estimates.as_mut().ok_or(Error::NotFitted)?;
        let before = estimates.len();
        estimates.rows.retain(|row| select::passes(row, thresholds));
        info!(
            event = event_names::MODEL_ESTIMATES_FILTERED,
            rows_before = before,
            rows_after = estimates.len(),
            "estimates filtered"
        );
        Ok(())
    }

    /// Restore the estimates produced by the last fit.
    pub fn reset_estimates(&mut self) -> Result<()> {
        let fitted = self.fitted.clone().ok_or(Error::NotFitted)?;
        self.estimates = Some(fitted);
        Ok(())
    }

    pub fn to_table(&self) -> Result<FlatTable> {
        Ok(self.estimates()?.to_table())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        artifact::save(path, ArtifactKind::Model, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        artifact::load(path, ArtifactKind::Model)
    }
}
