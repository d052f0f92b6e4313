//! Test utilities for es-core.
//!
//! This module provides test infrastructure including:
//! - Common assertions
//! - Fixture loading helpers
//! - Builders for care sites, visits and hand-written completeness series

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use es_common::month::month_range;
use es_common::{CareSite, CareSiteId, CareSiteLevel, VisitId};
use es_config::{PredictorAlgorithm, ProbeConfig, ProbeDomain};

use crate::data::VisitRecord;
use crate::probe::{Predictor, PredictorRow, Probe, SeriesKey};

// ============================================================================
// Macros (must be defined first for use in this module)
// ============================================================================

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Assert that a Result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(val) => panic!("Expected Err, got Ok: {:?}", val),
            Err(_) => {}
        }
    };
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(val) => panic!("{}: got Ok({:?})", $msg, val),
            Err(_) => {}
        }
    };
}

/// Assert that two floating point numbers are approximately equal.
#[macro_export]
macro_rules! assert_approx_eq {
    ($a:expr, $b:expr) => {
        $crate::assert_approx_eq!($a, $b, 1e-6_f64)
    };
    ($a:expr, $b:expr, $epsilon:expr) => {{
        let a: f64 = $a;
        let b: f64 = $b;
        let eps: f64 = $epsilon;
        let diff = (a - b).abs();
        if diff > eps {
            panic!(
                "assertion failed: `(left ~= right)` (left: `{}`, right: `{}`, diff: `{}`, epsilon: `{}`)",
                a, b, diff, eps
            );
        }
    }};
}

// ============================================================================
// Fixtures
// ============================================================================

/// Fixture directory relative to crate root.
pub const FIXTURES_DIR: &str = "tests/fixtures";

/// Get the path to a test fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join(FIXTURES_DIR).join(name)
}

/// Load a fixture file as a string.
pub fn load_fixture(name: &str) -> std::io::Result<String> {
    std::fs::read_to_string(fixture_path(name))
}

/// Load a fixture file and parse as JSON.
pub fn load_fixture_json<T: serde::de::DeserializeOwned>(name: &str) -> Result<T, String> {
    let content =
        load_fixture(name).map_err(|e| format!("Failed to read fixture {}: {}", name, e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse fixture {}: {}", name, e))
}

// ============================================================================
// Builders
// ============================================================================

/// First day of `year`-`month`.
pub fn month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).expect("valid month")
}

/// `n` consecutive months starting at `start`.
pub fn months_from(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    month_range(start, NaiveDate::MAX).into_iter().take(n).collect()
}

pub fn care_site(id: i64, name: &str, level: CareSiteLevel, parent: Option<i64>) -> CareSite {
    CareSite {
        care_site_id: CareSiteId(id),
        care_site_short_name: name.to_string(),
        care_site_level: level.display_name().to_string(),
        parent_id: parent.map(CareSiteId),
    }
}

pub fn visit(id: i64, care_site_id: i64, date: NaiveDate, stay_type: &str) -> VisitRecord {
    VisitRecord {
        visit_occurrence_id: VisitId(id),
        care_site_id: CareSiteId(care_site_id),
        visit_start_datetime: date,
        visit_end_datetime: None,
        person_id: None,
        visit_source_value: Some(stay_type.to_string()),
        provenance_source_value: None,
        stay_source_value: None,
        row_status_source_value: None,
    }
}

/// Series key at the hospital level with no label dimension.
pub fn hospital_key(id: i64, name: &str) -> SeriesKey {
    SeriesKey {
        care_site_level: CareSiteLevel::Hospital,
        care_site_id: CareSiteId(id),
        care_site_short_name: name.to_string(),
        labels: Vec::new(),
    }
}

/// Probe holding hand-written completeness series, one per key, all
/// starting at `start`.
pub fn probe_with_series(start: NaiveDate, series: &[(SeriesKey, Vec<f64>)]) -> Probe {
    let mut rows = Vec::new();
    for (key, values) in series {
        for (date, c) in months_from(start, values.len()).into_iter().zip(values) {
            rows.push(PredictorRow {
                key: key.clone(),
                date,
                counts: vec![(c * 100.0).round() as u64],
                c: *c,
            });
        }
    }
    let labels = series
        .first()
        .map(|(k, _)| vec!["stay_type".to_string(); k.labels.len()])
        .unwrap_or_default();
    let mut predictor = Predictor {
        domain: ProbeDomain::Visit,
        algorithm: PredictorAlgorithm::PerVisit,
        label_dimensions: labels,
        count_columns: vec!["n_visit".to_string()],
        rows,
    };
    predictor.sort();
    Probe::from_predictor(ProbeConfig::default(), Vec::new(), predictor)
}

/// Step series: 0 for `onset` months, then `level`.
pub fn step_values(len: usize, onset: usize, level: f64) -> Vec<f64> {
    (0..len).map(|i| if i >= onset { level } else { 0.0 }).collect()
}
