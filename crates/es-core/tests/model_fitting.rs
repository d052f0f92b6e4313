//! Model lifecycle tests: fit, predict, threshold filtering and persistence,
//! over hand-written completeness series.

use chrono::NaiveDate;
use es_common::Error;
use es_core::config::{CurveShape, FitStrategy, MetricName, ModelConfig, Thresholds};
use es_core::test_utils::{hospital_key, month, months_from, probe_with_series, step_values};
use es_core::{assert_approx_eq, assert_ok, FitOptions, Model, Probe, SeriesKey};
use tempfile::TempDir;

const START: (i32, u32) = (2020, 1);

fn start() -> NaiveDate {
    month(START.0, START.1)
}

fn nth_month(n: usize) -> NaiveDate {
    months_from(start(), n + 1)[n]
}

fn two_steps() -> Probe {
    probe_with_series(
        start(),
        &[
            (hospital_key(1, "Hôpital-1"), step_values(12, 4, 0.75)),
            (hospital_key(2, "Hôpital-2"), step_values(12, 8, 0.5)),
        ],
    )
}

fn fitted(config: ModelConfig, probe: &Probe) -> Model {
    let mut model = assert_ok!(Model::new(config));
    assert_ok!(model.fit(probe, &FitOptions::default()));
    model
}

// ============================================================================
// Step
// ============================================================================

mod step {
    use super::*;

    #[test]
    fn recovers_onset_and_plateau_per_series() {
        let model = fitted(ModelConfig::default(), &two_steps());
        let estimates = assert_ok!(model.estimates());
        assert_eq!(estimates.len(), 2);

        let first = estimates.get(&hospital_key(1, "Hôpital-1")).unwrap();
        assert_eq!(first.coefficients.t0, Some(nth_month(4)));
        assert_approx_eq!(first.coefficients.c0, 0.75);
        assert_approx_eq!(first.metric(MetricName::ErrorAfterT0).unwrap(), 0.0);

        let second = estimates.get(&hospital_key(2, "Hôpital-2")).unwrap();
        assert_eq!(second.coefficients.t0, Some(nth_month(8)));
        assert_approx_eq!(second.coefficients.c0, 0.5);
    }

    #[test]
    fn quantile_strategy_takes_first_month_reaching_level() {
        let probe = probe_with_series(
            start(),
            &[(hospital_key(1, "Hôpital-1"), step_values(12, 4, 1.0))],
        );
        let model = fitted(
            ModelConfig {
                strategy: FitStrategy::Quantile,
                quantile: 0.5,
                ..ModelConfig::default()
            },
            &probe,
        );
        let row = &assert_ok!(model.estimates()).rows[0];
        assert_approx_eq!(row.coefficients.c0, 1.0);
        assert_eq!(row.coefficients.t0, Some(nth_month(4)));
    }

    #[test]
    fn default_quantile_level_is_the_observed_quantile() {
        let config = ModelConfig {
            strategy: FitStrategy::Quantile,
            ..ModelConfig::default()
        };
        assert_approx_eq!(config.quantile, 0.8);

        // Rising series: the level is the 0.8 quantile of the values (0.96),
        // so the onset is the first month at 1.0, not the month at 0.8.
        let rising = vec![0.0, 0.2, 0.4, 0.6, 0.8, 0.85, 0.9, 0.95, 1.0, 1.0];
        let probe = probe_with_series(start(), &[(hospital_key(1, "H"), rising)]);
        let model = fitted(config.clone(), &probe);
        let row = &assert_ok!(model.estimates()).rows[0];
        assert_approx_eq!(row.coefficients.c0, 0.96);
        assert_eq!(row.coefficients.t0, Some(nth_month(8)));

        // Plateau at 0.8 from month 4 on: the quantile is the plateau level
        // and the onset is the month it is first reached.
        let plateau = vec![0.0, 0.2, 0.4, 0.6, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8];
        let probe = probe_with_series(start(), &[(hospital_key(1, "H"), plateau)]);
        let model = fitted(config, &probe);
        let row = &assert_ok!(model.estimates()).rows[0];
        assert_approx_eq!(row.coefficients.c0, 0.8);
        assert_eq!(row.coefficients.t0, Some(nth_month(4)));
    }

    #[test]
    fn onset_at_last_month_has_no_error_after_t0() {
        let probe = probe_with_series(
            start(),
            &[
                (hospital_key(1, "Hôpital-1"), vec![0.0, 0.0, 0.0, 0.9]),
                (hospital_key(2, "Hôpital-2"), vec![0.4]),
            ],
        );
        let model = fitted(ModelConfig::default(), &probe);
        let estimates = assert_ok!(model.estimates());

        let late = estimates.get(&hospital_key(1, "Hôpital-1")).unwrap();
        assert_eq!(late.coefficients.t0, Some(nth_month(3)));
        assert_eq!(late.metric(MetricName::ErrorAfterT0), None);

        let single = estimates.get(&hospital_key(2, "Hôpital-2")).unwrap();
        assert_eq!(single.metric(MetricName::ErrorAfterT0), None);
    }

    #[test]
    fn all_zero_series_still_yields_an_estimate() {
        let probe = probe_with_series(start(), &[(hospital_key(1, "H"), vec![0.0; 6])]);
        let model = fitted(ModelConfig::default(), &probe);
        let row = &assert_ok!(model.estimates()).rows[0];
        assert_approx_eq!(row.coefficients.c0, 0.0);
        assert_eq!(row.coefficients.t0, Some(start()));
    }

    #[test]
    fn requested_metrics_are_all_reported() {
        let model = fitted(
            ModelConfig {
                metrics: vec![MetricName::ErrorAfterT0, MetricName::Error],
                ..ModelConfig::default()
            },
            &two_steps(),
        );
        let estimates = assert_ok!(model.estimates());
        assert_eq!(
            estimates.metrics,
            vec![MetricName::Error, MetricName::ErrorAfterT0]
        );
        let table = estimates.to_table();
        assert!(table.column_names().contains(&"error"));
        assert!(table.column_names().contains(&"error_after_t0"));
    }
}

// ============================================================================
// Rectangle
// ============================================================================

mod rectangle {
    use super::*;

    #[test]
    fn recovers_inclusive_plateau() {
        let mut values = vec![0.0; 12];
        for v in values.iter_mut().take(9).skip(3) {
            *v = 0.5;
        }
        let probe = probe_with_series(start(), &[(hospital_key(1, "H"), values)]);
        let model = fitted(
            ModelConfig {
                shape: CurveShape::Rectangle,
                ..ModelConfig::default()
            },
            &probe,
        );
        let row = &assert_ok!(model.estimates()).rows[0];
        assert_eq!(row.coefficients.t0, Some(nth_month(3)));
        assert_eq!(row.coefficients.t1, Some(nth_month(8)));
        assert_approx_eq!(row.coefficients.c0, 0.5);
        assert_approx_eq!(row.metric(MetricName::ErrorBetweenT0T1).unwrap(), 0.0);

        let predictions = assert_ok!(model.predict(&probe));
        let c_hat: Vec<f64> = predictions.rows.iter().map(|r| r.c_hat).collect();
        assert_eq!(c_hat[2], 0.0);
        assert_eq!(c_hat[3], 0.5);
        assert_eq!(c_hat[8], 0.5);
        assert_eq!(c_hat[9], 0.0);
    }

    #[test]
    fn quantile_with_rectangle_is_rejected() {
        let err = Model::new(ModelConfig {
            shape: CurveShape::Rectangle,
            strategy: FitStrategy::Quantile,
            ..ModelConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedStrategy { .. }));
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn predict_matches_step_curve() {
        let probe = two_steps();
        let model = fitted(ModelConfig::default(), &probe);
        let predictions = assert_ok!(model.predict(&probe));
        assert_eq!(predictions.len(), 24);
        for row in &predictions.rows {
            assert_approx_eq!(row.c_hat, row.c);
        }
    }

    #[test]
    fn predict_skips_keys_without_estimate() {
        let model = fitted(ModelConfig::default(), &two_steps());
        let other = probe_with_series(
            start(),
            &[
                (hospital_key(1, "Hôpital-1"), step_values(3, 0, 1.0)),
                (hospital_key(9, "Hôpital-9"), step_values(3, 0, 1.0)),
            ],
        );
        let predictions = assert_ok!(model.predict(&other));
        assert_eq!(predictions.len(), 3);
        assert!(predictions.rows.iter().all(|r| r.key.care_site_id.0 == 1));
    }

    #[test]
    fn predict_rejects_other_label_dimensions() {
        let model = fitted(ModelConfig::default(), &two_steps());
        let labelled = SeriesKey {
            labels: vec!["All".to_string()],
            ..hospital_key(1, "Hôpital-1")
        };
        let probe = probe_with_series(start(), &[(labelled, step_values(3, 0, 1.0))]);
        let err = model.predict(&probe).unwrap_err();
        assert!(matches!(err, Error::IncompatibleProbe { .. }));
    }

    #[test]
    fn fit_window_restricts_months() {
        let probe = two_steps();
        let mut model = assert_ok!(Model::new(ModelConfig::default()));
        let options = FitOptions {
            start_date: Some(nth_month(6)),
            end_date: None,
        };
        let estimates = assert_ok!(model.fit(&probe, &options));
        let first = estimates.get(&hospital_key(1, "Hôpital-1")).unwrap();
        assert_eq!(first.coefficients.t0, Some(nth_month(6)));
        let second = estimates.get(&hospital_key(2, "Hôpital-2")).unwrap();
        assert_eq!(second.coefficients.t0, Some(nth_month(8)));

        let late = FitOptions {
            start_date: Some(month(2030, 1)),
            end_date: None,
        };
        assert!(assert_ok!(model.fit(&probe, &late)).is_empty());

        let inverted = FitOptions {
            start_date: Some(nth_month(6)),
            end_date: Some(nth_month(2)),
        };
        assert!(matches!(
            model.fit(&probe, &inverted),
            Err(Error::InvalidDateWindow { .. })
        ));
    }

    #[test]
    fn filter_and_reset_estimates() {
        let mut model = fitted(ModelConfig::default(), &two_steps());
        let thresholds = Thresholds {
            max_t0: Some(nth_month(5)),
            ..Thresholds::default()
        };
        assert_ok!(model.filter_estimates(&thresholds));
        assert_eq!(assert_ok!(model.estimates()).len(), 1);
        assert_ok!(model.reset_estimates());
        assert_eq!(assert_ok!(model.estimates()).len(), 2);
    }

    #[test]
    fn save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.json");
        let probe = two_steps();
        let model = fitted(ModelConfig::default(), &probe);
        assert_ok!(model.save(&path));

        let loaded = assert_ok!(Model::load(&path));
        assert_eq!(assert_ok!(loaded.estimates()), assert_ok!(model.estimates()));
        assert_eq!(
            assert_ok!(loaded.predict(&probe)),
            assert_ok!(model.predict(&probe))
        );

        let err = Probe::load(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { .. }));
    }
}
