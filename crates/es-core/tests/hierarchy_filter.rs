//! Care-site hierarchy and probe filtering tests.
//!
//! Exercises closure semantics (a site, its ancestors and its descendants)
//! on the small fixture dataset and on a synthetic tree, plus the
//! visit-side dimensions the fixture's person and stay columns feed.

use std::collections::{BTreeMap, BTreeSet};

use es_common::{CareSiteId, CareSiteLevel, Error, LabelSpec};
use es_core::config::{PredictorAlgorithm, ProbeConfig, ProbeDomain};
use es_core::test_utils::{care_site, load_fixture};
use es_core::{assert_err, assert_ok, CareSiteHierarchy, Dataset, Probe, SyntheticConfig};

fn fixture() -> Dataset {
    let json = load_fixture("small_dataset.json").expect("fixture present");
    assert_ok!(Dataset::from_json(&json))
}

fn computed(config: ProbeConfig) -> Probe {
    let mut probe = Probe::new(config);
    assert_ok!(probe.compute(&fixture()));
    probe
}

fn site_ids(probe: &Probe) -> BTreeSet<i64> {
    assert_ok!(probe.predictor())
        .rows
        .iter()
        .map(|r| r.key.care_site_id.0)
        .collect()
}

// ============================================================================
// Hierarchy index
// ============================================================================

mod index {
    use super::*;

    #[test]
    fn mixed_level_spellings_parse() {
        let data = fixture();
        let hierarchy = assert_ok!(CareSiteHierarchy::new(
            assert_ok!(data.care_sites()).iter().cloned()
        ));
        assert_eq!(hierarchy.len(), 6);
        assert_eq!(hierarchy.level(CareSiteId(4)), Some(CareSiteLevel::Uf));
        assert_eq!(hierarchy.level(CareSiteId(5)), Some(CareSiteLevel::Hospital));
        assert_eq!(
            hierarchy.ancestor_at_level(CareSiteId(4), CareSiteLevel::Hospital),
            Some(CareSiteId(1))
        );
    }

    #[test]
    fn closure_of_a_pole() {
        let data = fixture();
        let hierarchy = assert_ok!(CareSiteHierarchy::new(
            assert_ok!(data.care_sites()).iter().cloned()
        ));
        let ids: BTreeSet<i64> = hierarchy
            .closure(&["Pole-A".to_string()], &[])
            .into_iter()
            .map(|id| id.0)
            .collect();
        assert_eq!(ids, BTreeSet::from([1, 2, 3, 4]));
    }

    #[test]
    fn cycle_is_a_data_error() {
        let sites = vec![
            care_site(1, "A", CareSiteLevel::Pole, Some(2)),
            care_site(2, "B", CareSiteLevel::Pole, Some(1)),
        ];
        let err = CareSiteHierarchy::new(sites).unwrap_err();
        assert!(matches!(err, Error::HierarchyCycle { .. }));
    }
}

// ============================================================================
// Probe filtering
// ============================================================================

mod probe_filter {
    use super::*;

    #[test]
    fn hospital_filter_keeps_its_subtree() {
        let mut probe = computed(ProbeConfig::default());
        assert_eq!(site_ids(&probe), BTreeSet::from([1, 2, 3, 4, 5, 6]));

        assert_ok!(probe.filter_care_site(&["Hospital-1".to_string()], &[]));
        assert_eq!(site_ids(&probe), BTreeSet::from([1, 2, 3, 4]));
    }

    #[test]
    fn unit_filter_keeps_its_ancestors() {
        let mut probe = computed(ProbeConfig::default());
        assert_ok!(probe.filter_care_site(&[], &[CareSiteId(3)]));
        assert_eq!(site_ids(&probe), BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn unknown_names_are_ignored() {
        let mut probe = computed(ProbeConfig::default());
        assert_ok!(probe.filter_care_site(
            &["Unit-Z".to_string(), "Nowhere".to_string()],
            &[CareSiteId(999)]
        ));
        assert_eq!(site_ids(&probe), BTreeSet::from([5, 6]));
    }

    #[test]
    fn configured_selection_applies_at_compute() {
        let probe = computed(ProbeConfig {
            care_site_short_names: vec!["Hospital-2".to_string()],
            ..ProbeConfig::default()
        });
        assert_eq!(site_ids(&probe), BTreeSet::from([5, 6]));
    }

    #[test]
    fn reset_undoes_filters() {
        let mut probe = computed(ProbeConfig::default());
        let full = assert_ok!(probe.predictor()).clone();
        assert_ok!(probe.filter_care_site(&["Unit-Y".to_string()], &[]));
        assert_ok!(probe.filter_date_per_care_site());
        assert_ne!(assert_ok!(probe.predictor()).len(), full.len());
        assert_ok!(probe.reset_predictor());
        assert_eq!(assert_ok!(probe.predictor()), &full);
    }

    #[test]
    fn deleted_visits_do_not_count() {
        let probe = computed(ProbeConfig {
            care_site_levels: vec!["UF".to_string()],
            ..ProbeConfig::default()
        });
        let unit_z: Vec<u64> = assert_ok!(probe.predictor())
            .rows
            .iter()
            .filter(|r| r.key.care_site_id.0 == 6 && r.counts[0] > 0)
            .map(|r| r.counts[0])
            .collect();
        assert_eq!(unit_z, vec![1]);
    }

    #[test]
    fn filter_requires_compute() {
        let mut probe = Probe::default();
        assert_err!(probe.filter_care_site(&[], &[]));
        assert_err!(probe.filter_date_per_care_site());
    }
}

// ============================================================================
// Synthetic trees
// ============================================================================

mod synthetic_tree {
    use super::*;

    #[test]
    fn hospital_closure_on_two_hospitals() {
        let data = SyntheticConfig::default()
            .hospitals(2)
            .poles_per_hospital(2)
            .units_per_pole(2)
            .months(6)
            .deployment(vec![0])
            .generate();
        let mut probe = Probe::new(ProbeConfig::default());
        assert_ok!(probe.compute(&data));
        assert_ok!(probe.filter_care_site(&["Hôpital-1".to_string()], &[]));

        let names: BTreeSet<String> = assert_ok!(probe.predictor())
            .rows
            .iter()
            .map(|r| r.key.care_site_short_name.clone())
            .collect();
        assert!(names.contains("Hôpital-1"));
        assert!(names.contains("UF-1-2-2"));
        assert!(!names
            .iter()
            .any(|n| n.starts_with("UF-2-") || n.starts_with("Pôle-2-") || n == "Hôpital-2"));
        assert_eq!(names.len(), 1 + 2 + 4);
    }
}

// ============================================================================
// Visit-side dimensions
// ============================================================================

mod visit_dimensions {
    use super::*;

    fn observed(probe: &Probe) -> BTreeMap<(i64, Vec<String>), Vec<u64>> {
        let mut out: BTreeMap<(i64, Vec<String>), Vec<u64>> = BTreeMap::new();
        for row in &assert_ok!(probe.predictor()).rows {
            let totals = out
                .entry((row.key.care_site_id.0, row.key.labels.clone()))
                .or_insert_with(|| vec![0; row.counts.len()]);
            for (t, c) in totals.iter_mut().zip(&row.counts) {
                *t += c;
            }
        }
        out.retain(|_, totals| totals[0] > 0);
        out
    }

    fn key(site: i64, label: &str) -> (i64, Vec<String>) {
        (site, vec![label.to_string()])
    }

    #[test]
    fn age_ranges_split_units() {
        let probe = computed(ProbeConfig {
            care_site_levels: vec!["UF".to_string()],
            age_ranges: Some(vec![18, 64]),
            ..ProbeConfig::default()
        });
        assert_eq!(
            assert_ok!(probe.predictor()).label_dimensions,
            vec!["age_range"]
        );
        let keys: BTreeSet<_> = observed(&probe).into_keys().collect();
        assert_eq!(
            keys,
            BTreeSet::from([
                key(3, "age <= 18"),
                key(3, "age > 64"),
                key(4, "18 < age <= 64"),
                key(4, "Unknown"),
                key(6, "age > 64"),
            ])
        );
    }

    #[test]
    fn age_ranges_without_person_table() {
        let mut data = fixture();
        data.person = None;
        let mut probe = Probe::new(ProbeConfig {
            age_ranges: Some(vec![18, 64]),
            ..ProbeConfig::default()
        });
        let err = probe.compute(&data).unwrap_err();
        assert!(matches!(err, Error::MissingTable(ref t) if t == "person"));
    }

    #[test]
    fn length_of_stay_bins() {
        let probe = computed(ProbeConfig {
            care_site_levels: vec!["UF".to_string()],
            length_of_stays: Some(vec![1.0, 7.0]),
            ..ProbeConfig::default()
        });
        let keys: BTreeSet<_> = observed(&probe).into_keys().collect();
        assert_eq!(
            keys,
            BTreeSet::from([
                key(3, "1 days - 7 days"),
                key(3, "< 1 days"),
                key(4, ">= 7 days"),
                key(4, "Incomplete stay"),
                key(6, "1 days - 7 days"),
            ])
        );
    }

    #[test]
    fn provenance_on_the_visit_side_of_notes() {
        let probe = computed(ProbeConfig {
            domain: ProbeDomain::Note,
            algorithm: PredictorAlgorithm::PerVisit,
            care_site_levels: vec!["UF".to_string()],
            provenance_sources: Some(LabelSpec::all()),
            ..ProbeConfig::default()
        });
        let totals = observed(&probe);
        // Unit-Y's second visit has no provenance and drops out.
        assert_eq!(totals[&key(3, "All")], vec![2, 1]);
        assert_eq!(totals[&key(4, "All")], vec![1, 1]);
        assert_eq!(totals[&key(6, "All")], vec![1, 1]);
    }

    #[test]
    fn care_sites_sets_name_units() {
        let probe = computed(ProbeConfig {
            care_site_levels: vec!["UF".to_string()],
            care_sites_sets: Some(LabelSpec::Map(BTreeMap::from([
                ("Hospital-1 units".to_string(), "^Unit-[XY]$".to_string()),
            ]))),
            ..ProbeConfig::default()
        });
        let keys: BTreeSet<_> = observed(&probe).into_keys().collect();
        assert_eq!(
            keys,
            BTreeSet::from([key(3, "Hospital-1 units"), key(4, "Hospital-1 units")])
        );
    }
}
