//! Grouped aggregation of events into completeness rows.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use es_common::month::{month_range, month_range_inclusive, month_start};
use es_common::{CareSiteLevel, VisitId};
use es_config::Normalizer;
use es_math::{max, percentile, ratio_or_zero};
use tracing::debug;

use super::dimension::Dimension;
use super::domain::Event;
use super::predictor::{PredictorRow, SeriesKey};
use crate::hierarchy::CareSiteHierarchy;

/// Month window, start included and end excluded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Window {
    pub fn contains(&self, month: NaiveDate) -> bool {
        self.start.is_none_or(|s| month >= month_start(s)) && self.end.is_none_or(|e| month < e)
    }
}

/// Shared grouping context.
pub struct Grouping<'h> {
    pub hierarchy: &'h CareSiteHierarchy,
    pub levels: &'h [CareSiteLevel],
    pub window: Window,
}

impl Grouping<'_> {
    /// Month bucket and keys an event contributes to.
    ///
    /// `dims` selects which of the event's values take part in the key. An
    /// event with no matching label in an active dimension contributes
    /// nothing.
    fn keys(&self, event: &Event<'_>, dims: &[(usize, &Dimension)]) -> Option<(NaiveDate, Vec<SeriesKey>)> {
        let month = month_start(event.date);
        if !self.window.contains(month) {
            return None;
        }
        let combos = label_combinations(event, dims);
        if combos.is_empty() {
            return None;
        }

        let mut keys = Vec::new();
        for &level in self.levels {
            let Some(site_id) = self.hierarchy.ancestor_at_level(event.care_site_id, level) else {
                continue;
            };
            let short_name = self.hierarchy.short_name(site_id).unwrap_or_default();
            for labels in &combos {
                keys.push(SeriesKey {
                    care_site_level: level,
                    care_site_id: site_id,
                    care_site_short_name: short_name.to_string(),
                    labels: labels.clone(),
                });
            }
        }
        Some((month, keys))
    }

    /// Distinct ids per key and month.
    fn bucket<T: Ord>(
        &self,
        events: &[Event<'_>],
        dims: &[(usize, &Dimension)],
        id: impl Fn(&Event<'_>) -> T,
    ) -> BTreeMap<SeriesKey, BTreeMap<NaiveDate, BTreeSet<T>>> {
        let mut out: BTreeMap<SeriesKey, BTreeMap<NaiveDate, BTreeSet<T>>> = BTreeMap::new();
        for event in events {
            let Some((month, keys)) = self.keys(event, dims) else {
                continue;
            };
            for key in keys {
                out.entry(key)
                    .or_default()
                    .entry(month)
                    .or_default()
                    .insert(id(event));
            }
        }
        out
    }
}

/// Cartesian product of the labels matching each active dimension.
fn label_combinations(event: &Event<'_>, dims: &[(usize, &Dimension)]) -> Vec<Vec<String>> {
    let mut combos: Vec<Vec<String>> = vec![Vec::new()];
    for &(pos, dim) in dims {
        let Some(raw) = event.values.get(pos).and_then(|v| v.as_deref()) else {
            return Vec::new();
        };
        let labels = dim.classify(raw);
        if labels.is_empty() {
            return Vec::new();
        }
        combos = combos
            .into_iter()
            .flat_map(|prefix| {
                labels.iter().map(move |label| {
                    let mut next = prefix.clone();
                    next.push((*label).to_string());
                    next
                })
            })
            .collect();
    }
    combos
}

/// Monthly distinct event counts over a robust maximum per group.
///
/// Every group gets a row for every month of the range, with count 0 where
/// nothing happened.
pub fn per_entity_normalized(
    grouping: &Grouping<'_>,
    events: &[Event<'_>],
    dims: &[Dimension],
    normalizer: Normalizer,
) -> Vec<PredictorRow> {
    let all_dims: Vec<(usize, &Dimension)> = dims.iter().enumerate().collect();
    let buckets = grouping.bucket(events, &all_dims, |e| e.id);

    let months = match (grouping.window.start, grouping.window.end) {
        (Some(start), Some(end)) => month_range(start, end),
        _ => {
            let observed = buckets.values().flat_map(|m| m.keys().copied());
            match (observed.clone().min(), observed.max()) {
                (Some(first), Some(last)) => month_range_inclusive(first, last),
                _ => Vec::new(),
            }
        }
    };

    let mut rows = Vec::new();
    for (key, by_month) in buckets {
        let counts: Vec<u64> = months
            .iter()
            .map(|m| by_month.get(m).map_or(0, |ids| ids.len() as u64))
            .collect();
        let values: Vec<f64> = counts.iter().map(|&n| n as f64).collect();
        let norm = match normalizer {
            Normalizer::Max => max(&values),
            Normalizer::P99 => percentile(&values, 99.0),
        }
        .unwrap_or(0.0);
        if norm == 0.0 {
            debug!(
                care_site_id = key.care_site_id.0,
                labels = ?key.labels,
                "zero normalizer, completeness set to 0"
            );
        }

        for (month, n) in months.iter().zip(counts) {
            rows.push(PredictorRow {
                key: key.clone(),
                date: *month,
                counts: vec![n],
                c: ratio_or_zero(n as f64, norm).min(1.0),
            });
        }
    }
    rows
}

/// Share of visits with at least one linked secondary event.
///
/// `primary_dims` are the positions of the dimensions read from the visit.
/// Only months with at least one visit produce a row.
pub fn per_related_event(
    grouping: &Grouping<'_>,
    visits: &[Event<'_>],
    linked: &[Event<'_>],
    dims: &[Dimension],
    primary_dims: &[usize],
) -> Vec<PredictorRow> {
    let primary: Vec<(usize, &Dimension)> = primary_dims.iter().map(|&i| (i, &dims[i])).collect();
    let all_dims: Vec<(usize, &Dimension)> = dims.iter().enumerate().collect();

    let totals = grouping.bucket(visits, &primary, |e| e.visit);
    let with_secondary: BTreeMap<SeriesKey, BTreeMap<NaiveDate, BTreeSet<VisitId>>> =
        grouping.bucket(linked, &all_dims, |e| e.visit);

    let mut rows = Vec::new();
    for (key, by_month) in &with_secondary {
        let Some(visit_months) = totals.get(&key.project(primary_dims)) else {
            continue;
        };
        for (month, visit_ids) in visit_months {
            let n_visit = visit_ids.len() as u64;
            let n_with = by_month.get(month).map_or(0, |ids| ids.len() as u64);
            rows.push(PredictorRow {
                key: key.clone(),
                date: *month,
                counts: vec![n_visit, n_with],
                c: ratio_or_zero(n_with as f64, n_visit as f64),
            });
        }
    }
    rows
}
