//! End-to-end pipeline tests on synthetic data.
//!
//! Three units switch on at known months over a 24-month window; the
//! pipeline must find those months back and select on them.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use es_common::{Error, LabelSpec, ALL_LABEL};
use es_core::config::{PipelineConfig, ProbeConfig, Thresholds};
use es_core::test_utils::{fixture_path, month};
use es_core::{assert_ok, select, FitOptions, Model, Probe, SyntheticConfig};
use es_store::{read_table, write_table, Column, TableName, WriterConfig};
use tempfile::TempDir;

fn uf_probe(config: &SyntheticConfig) -> Probe {
    let mut probe = Probe::new(ProbeConfig {
        care_site_levels: vec!["UF".to_string()],
        ..ProbeConfig::default()
    });
    assert_ok!(probe.compute(&config.generate()));
    probe
}

fn onsets(model: &Model) -> BTreeMap<String, Option<NaiveDate>> {
    assert_ok!(model.estimates())
        .rows
        .iter()
        .map(|r| (r.key.care_site_short_name.clone(), r.coefficients.t0))
        .collect()
}

fn months_apart(a: NaiveDate, b: NaiveDate) -> i64 {
    use chrono::Datelike;
    (a.year() as i64 * 12 + a.month() as i64) - (b.year() as i64 * 12 + b.month() as i64)
}

// ============================================================================
// Deployment recovery
// ============================================================================

mod recovery {
    use super::*;

    #[test]
    fn three_units_over_two_years() {
        let config = SyntheticConfig::default();
        let mut probe = Probe::new(ProbeConfig {
            care_site_levels: vec!["UF".to_string()],
            stay_types: Some(LabelSpec::all()),
            ..ProbeConfig::default()
        });
        assert_ok!(probe.compute(&config.generate()));
        let predictor = assert_ok!(probe.predictor());
        assert_eq!(predictor.label_dimensions, vec!["stay_type"]);
        assert_eq!(predictor.num_series(), 3);
        assert_eq!(predictor.len(), 3 * 24);
        assert!(predictor.rows.iter().all(|r| r.key.labels == vec![ALL_LABEL]));
        assert!(predictor.rows.iter().all(|r| (0.0..=1.0).contains(&r.c)));

        let mut model = assert_ok!(Model::new(Default::default()));
        assert_ok!(model.fit(&probe, &FitOptions::default()));
        let found = onsets(&model);
        for deployment in config.deployments() {
            assert_eq!(found[&deployment.short_name], Some(deployment.month));
        }
    }

    #[test]
    fn noisy_counts_stay_within_a_month() {
        let config = SyntheticConfig::default().noise(0.2).seed(7);
        let probe = uf_probe(&config);
        let mut model = assert_ok!(Model::new(Default::default()));
        assert_ok!(model.fit(&probe, &FitOptions::default()));
        let found = onsets(&model);
        for deployment in config.deployments() {
            let t0 = found[&deployment.short_name].expect("onset found");
            assert!(
                months_apart(t0, deployment.month).abs() <= 1,
                "{}: fitted {} vs deployed {}",
                deployment.short_name,
                t0,
                deployment.month
            );
        }
    }

    #[test]
    fn select_by_onset() {
        let config = SyntheticConfig::default();
        let probe = uf_probe(&config);
        let mut model = assert_ok!(Model::new(Default::default()));
        let estimates = assert_ok!(model.fit(&probe, &FitOptions::default()));

        let thresholds = Thresholds {
            max_t0: Some(month(2020, 7)),
            ..Thresholds::default()
        };
        let names: Vec<&str> = select(estimates, &thresholds)
            .iter()
            .map(|r| r.key.care_site_short_name.as_str())
            .collect();
        assert_eq!(names, vec!["UF-1-1-1", "UF-1-1-2"]);
    }

    #[test]
    fn pole_series_rolls_up_units() {
        let config = SyntheticConfig::default();
        let mut probe = Probe::new(ProbeConfig {
            care_site_levels: vec!["Pole".to_string()],
            ..ProbeConfig::default()
        });
        let predictor = assert_ok!(probe.compute(&config.generate()));
        assert_eq!(predictor.num_series(), 1);
        let counts: Vec<u64> = predictor.rows.iter().map(|r| r.counts[0]).collect();
        assert_eq!(counts[0], 20);
        assert_eq!(counts[6], 40);
        assert_eq!(counts[23], 60);
    }
}

// ============================================================================
// Labels and domains
// ============================================================================

mod labels {
    use super::*;

    #[test]
    fn stay_type_labels_split_series() {
        let config = SyntheticConfig::default();
        let mut probe = Probe::new(ProbeConfig {
            care_site_levels: vec!["UF".to_string()],
            stay_types: Some(LabelSpec::Map(BTreeMap::from([
                ("Urg".to_string(), "urgence".to_string()),
                ("Hospit".to_string(), "hospit".to_string()),
            ]))),
            ..ProbeConfig::default()
        });
        let predictor = assert_ok!(probe.compute(&config.generate()));
        assert_eq!(predictor.label_dimensions, vec!["stay_type"]);
        assert_eq!(predictor.num_series(), 6);
    }

    #[test]
    fn note_pipeline_needs_note_table() {
        let pipeline = PipelineConfig::from_file(&fixture_path("pipeline_note.json"))
            .expect("fixture parses");
        let mut probe = Probe::new(pipeline.probe);
        let err = probe.compute(&SyntheticConfig::default().generate()).unwrap_err();
        assert!(matches!(err, Error::MissingTable(ref t) if t == "note"));
    }
}

// ============================================================================
// Persistence
// ============================================================================

mod persistence {
    use super::*;

    #[test]
    fn probe_artifact_and_parquet_round_trip() {
        let temp = TempDir::new().unwrap();
        let probe = uf_probe(&SyntheticConfig::default().months(12));

        let probe_path = temp.path().join("artifacts/probe.json");
        assert_ok!(probe.save(&probe_path));
        let loaded = assert_ok!(Probe::load(&probe_path));
        assert_eq!(
            assert_ok!(loaded.predictor()),
            assert_ok!(probe.predictor())
        );

        let table = assert_ok!(probe.to_table());
        let parquet_path = temp.path().join("predictor.parquet");
        assert_ok!(write_table(&parquet_path, &table, &WriterConfig::new()));
        let back = assert_ok!(read_table(&parquet_path, TableName::Predictor));
        assert_eq!(back.num_rows(), 36);
        assert_eq!(back.column_names(), table.column_names());
        assert_eq!(back.column("c"), table.column("c"));
        assert!(matches!(back.column("date"), Some(Column::Date(_))));
    }
}
