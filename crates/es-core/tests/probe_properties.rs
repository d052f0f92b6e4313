//! Property-based tests for probe and model invariants.

use std::collections::BTreeMap;

use chrono::{Days, Months, NaiveDate};
use es_common::{CareSite, CareSiteId, CareSiteLevel, LabelSpec, VisitId};
use es_core::config::{ModelConfig, PredictorAlgorithm, ProbeConfig, ProbeDomain};
use es_core::data::{NoteRecord, VisitRecord};
use es_core::{Dataset, FitOptions, Model, Probe};
use proptest::prelude::*;

const UNITS: [i64; 3] = [3, 4, 5];
const STAY_TYPES: [&str; 3] = ["hospitalisés", "urgence", "consultation"];

/// (unit index, month offset, day, stay type index, deleted, has note, stay length)
type VisitSpec = (usize, u32, u64, usize, bool, bool, Option<u64>);

fn visit_strategy() -> impl Strategy<Value = VisitSpec> {
    (
        0..3usize,
        0..12u32,
        0..28u64,
        0..3usize,
        prop::bool::weighted(0.1),
        any::<bool>(),
        prop::option::of(0..60u64),
    )
}

fn site(id: i64, name: &str, level: CareSiteLevel, parent: Option<i64>) -> CareSite {
    CareSite {
        care_site_id: CareSiteId(id),
        care_site_short_name: name.to_string(),
        care_site_level: level.as_str().to_string(),
        parent_id: parent.map(CareSiteId),
    }
}

fn dataset(specs: &[VisitSpec]) -> Dataset {
    let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
    let mut visits = Vec::new();
    let mut notes = Vec::new();
    for (k, &(unit, offset, day, stay, deleted, has_note, length)) in specs.iter().enumerate() {
        let date = start
            .checked_add_months(Months::new(offset))
            .and_then(|d| d.checked_add_days(Days::new(day)))
            .unwrap();
        let id = k as i64 + 1;
        visits.push(VisitRecord {
            visit_occurrence_id: VisitId(id),
            care_site_id: CareSiteId(UNITS[unit]),
            visit_start_datetime: date,
            visit_end_datetime: length.and_then(|n| date.checked_add_days(Days::new(n))),
            person_id: None,
            visit_source_value: Some(STAY_TYPES[stay].to_string()),
            provenance_source_value: None,
            stay_source_value: None,
            row_status_source_value: deleted.then(|| "supprimé".to_string()),
        });
        if has_note {
            notes.push(NoteRecord {
                note_id: 1000 + id,
                visit_occurrence_id: VisitId(id),
                note_datetime: date,
                note_class_source_value: Some("CRH".to_string()),
                row_status_source_value: None,
            });
        }
    }
    Dataset {
        care_site: Some(vec![
            site(1, "Hospital-1", CareSiteLevel::Hospital, None),
            site(2, "Pole-1", CareSiteLevel::Pole, Some(1)),
            site(3, "UF-1", CareSiteLevel::Uf, Some(2)),
            site(4, "UF-2", CareSiteLevel::Uf, Some(2)),
            site(5, "UF-3", CareSiteLevel::Uf, Some(2)),
        ]),
        visit_occurrence: Some(visits),
        note: Some(notes),
        ..Dataset::default()
    }
}

fn stay_types() -> Option<LabelSpec> {
    Some(LabelSpec::Single("urgence|hospit".to_string()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Completeness is a ratio in [0, 1] for every algorithm family.
    #[test]
    fn completeness_is_bounded(specs in prop::collection::vec(visit_strategy(), 1..120)) {
        let data = dataset(&specs);
        for (domain, algorithm) in [
            (ProbeDomain::Visit, PredictorAlgorithm::PerVisit),
            (ProbeDomain::Note, PredictorAlgorithm::PerVisit),
            (ProbeDomain::Note, PredictorAlgorithm::PerNote),
        ] {
            let mut probe = Probe::new(ProbeConfig {
                domain,
                algorithm,
                stay_types: stay_types(),
                ..ProbeConfig::default()
            });
            let predictor = probe.compute(&data).expect("compute succeeds");
            for row in &predictor.rows {
                prop_assert!((0.0..=1.0).contains(&row.c), "c out of range: {}", row.c);
            }
        }
    }

    /// Per-visit note completeness is the share of visits with a note.
    #[test]
    fn per_visit_ratio_matches_counts(specs in prop::collection::vec(visit_strategy(), 1..120)) {
        let mut probe = Probe::new(ProbeConfig {
            domain: ProbeDomain::Note,
            algorithm: PredictorAlgorithm::PerVisit,
            ..ProbeConfig::default()
        });
        let predictor = probe.compute(&dataset(&specs)).expect("compute succeeds");
        for row in &predictor.rows {
            let (n_visit, n_with) = (row.counts[0], row.counts[1]);
            prop_assert!(n_visit > 0);
            prop_assert!(n_with <= n_visit);
            prop_assert!((row.c - n_with as f64 / n_visit as f64).abs() < 1e-12);
        }
    }

    /// Computing twice gives the same, sorted series.
    #[test]
    fn compute_is_deterministic(specs in prop::collection::vec(visit_strategy(), 1..80)) {
        let data = dataset(&specs);
        let config = ProbeConfig { stay_types: stay_types(), ..ProbeConfig::default() };
        let mut first = Probe::new(config.clone());
        let mut second = Probe::new(config);
        let a = first.compute(&data).expect("compute succeeds").clone();
        let b = second.compute(&data).expect("compute succeeds");
        prop_assert_eq!(&a, b);
        let keys: Vec<_> = a.rows.iter().map(|r| (&r.key, r.date)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        prop_assert_eq!(keys, sorted);
    }

    /// Trimming to active months is idempotent and never adds rows.
    #[test]
    fn date_trim_is_idempotent(specs in prop::collection::vec(visit_strategy(), 1..80)) {
        let mut probe = Probe::new(ProbeConfig::default());
        let before = probe.compute(&dataset(&specs)).expect("compute succeeds").len();
        probe.filter_date_per_care_site().expect("computed");
        let once = probe.predictor().expect("computed").clone();
        probe.filter_date_per_care_site().expect("computed");
        prop_assert!(once.len() <= before);
        prop_assert_eq!(&once, probe.predictor().expect("computed"));
    }

    /// Length-of-stay bins partition visits: per month, bin counts add up
    /// to the unbinned count.
    #[test]
    fn stay_length_bins_partition_visits(specs in prop::collection::vec(visit_strategy(), 1..120)) {
        let data = dataset(&specs);
        let levels = vec!["UF".to_string()];
        let mut plain = Probe::new(ProbeConfig {
            care_site_levels: levels.clone(),
            ..ProbeConfig::default()
        });
        let mut binned = Probe::new(ProbeConfig {
            care_site_levels: levels,
            length_of_stays: Some(vec![1.0, 30.0]),
            ..ProbeConfig::default()
        });
        let plain = plain.compute(&data).expect("compute succeeds");
        let binned = binned.compute(&data).expect("compute succeeds");

        let mut totals: BTreeMap<(i64, NaiveDate), u64> = BTreeMap::new();
        for row in &binned.rows {
            prop_assert!((0.0..=1.0).contains(&row.c));
            *totals.entry((row.key.care_site_id.0, row.date)).or_default() += row.counts[0];
        }
        for row in &plain.rows {
            let binned_total = totals.get(&(row.key.care_site_id.0, row.date)).copied().unwrap_or(0);
            prop_assert_eq!(binned_total, row.counts[0]);
        }
    }

    /// Fitted plateaus stay within the observed completeness range.
    #[test]
    fn fitted_plateau_is_bounded(specs in prop::collection::vec(visit_strategy(), 1..120)) {
        let mut probe = Probe::new(ProbeConfig::default());
        probe.compute(&dataset(&specs)).expect("compute succeeds");
        let mut model = Model::new(ModelConfig::default()).expect("valid config");
        let estimates = model.fit(&probe, &FitOptions::default()).expect("fit succeeds");
        for row in &estimates.rows {
            prop_assert!((0.0..=1.0).contains(&row.coefficients.c0));
            prop_assert!(row.coefficients.t0.is_some());
        }
    }
}
