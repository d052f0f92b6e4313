//! Domain/algorithm plans and event extraction.
//!
//! A plan fixes, for one (domain, algorithm) pair, the completeness family,
//! the secondary dimensions the domain understands and the additive count
//! columns it produces. Visit-side dimensions apply to every domain.
//! Extraction turns dataset tables into uniform events carrying one raw
//! value per active dimension.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::NaiveDate;
use es_common::{CareSiteId, Error, LabelMapping, Result, VisitId};
use es_config::{validate_bounds, PredictorAlgorithm, ProbeConfig, ProbeDomain};

use super::dimension::{
    is_visit_dimension, Dimension, Partition, VisitContext, AGE_RANGE, LENGTH_OF_STAY,
};
use crate::data::{
    is_deleted, ConditionRecord, Dataset, MeasurementRecord, NoteRecord, VisitRecord,
};

/// Completeness family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletenessAlgorithm {
    /// Monthly event count divided by a robust maximum of the group.
    PerEntityNormalized,
    /// Share of primary visits with at least one linked secondary event.
    PerRelatedEvent,
}

type Names = &'static [&'static str];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmPlan {
    pub domain: ProbeDomain,
    pub algorithm: PredictorAlgorithm,
    pub family: CompletenessAlgorithm,
    /// Dimensions read from the domain's own table.
    pub secondary_dimensions: Names,
    pub count_columns: Names,
}

impl AlgorithmPlan {
    pub fn new(domain: ProbeDomain, algorithm: PredictorAlgorithm) -> Result<Self> {
        use CompletenessAlgorithm::*;
        use PredictorAlgorithm::*;

        let (family, secondary_dimensions, count_columns): (_, Names, Names) =
            match (domain, algorithm) {
                (ProbeDomain::Visit, PerVisit) => (PerEntityNormalized, &[], &["n_visit"]),
                (ProbeDomain::Note, PerVisit) => (
                    PerRelatedEvent,
                    &["note_type"],
                    &["n_visit", "n_visit_with_note"],
                ),
                (ProbeDomain::Note, PerNote) => (PerEntityNormalized, &["note_type"], &["n_note"]),
                (ProbeDomain::Condition, PerVisit) => (
                    PerRelatedEvent,
                    &["diag_type", "condition_type", "source_system"],
                    &["n_visit", "n_visit_with_condition"],
                ),
                (ProbeDomain::Condition, PerCondition) => (
                    PerEntityNormalized,
                    &["diag_type", "condition_type", "source_system"],
                    &["n_condition"],
                ),
                (ProbeDomain::Biology, PerVisit) => (
                    PerRelatedEvent,
                    &["concepts_set"],
                    &["n_visit", "n_visit_with_measurement"],
                ),
                (ProbeDomain::Biology, PerMeasurement) => {
                    (PerEntityNormalized, &["concepts_set"], &["n_measurement"])
                }
                _ => {
                    return Err(Error::UnsupportedAlgorithm {
                        domain: domain.to_string(),
                        algorithm: algorithm.to_string(),
                    })
                }
            };

        Ok(AlgorithmPlan {
            domain,
            algorithm,
            family,
            secondary_dimensions,
            count_columns,
        })
    }

    pub fn applies(&self, dimension: &str) -> bool {
        is_visit_dimension(dimension) || self.secondary_dimensions.contains(&dimension)
    }

    /// Compile the configured label specs and bins, rejecting dimensions
    /// the domain does not have.
    pub fn dimensions_for(&self, config: &ProbeConfig) -> Result<Vec<Dimension>> {
        let mut out = Vec::new();
        for (name, spec) in config.label_specs() {
            if !self.applies(name) {
                return Err(Error::Config(format!(
                    "label dimension {} does not apply to the {} domain",
                    name, self.domain
                )));
            }
            out.push(Dimension::labels(name, LabelMapping::compile(spec)?));
        }
        if let Some(bounds) = &config.age_ranges {
            let as_f64: Vec<f64> = bounds.iter().map(|b| f64::from(*b)).collect();
            validate_bounds("probe.age_ranges", &as_f64)
                .map_err(|e| Error::Config(e.to_string()))?;
            out.push(Dimension {
                name: AGE_RANGE,
                partition: Partition::AgeRange(bounds.clone()),
            });
        }
        if let Some(bounds) = &config.length_of_stays {
            validate_bounds("probe.length_of_stays", bounds)
                .map_err(|e| Error::Config(e.to_string()))?;
            out.push(Dimension {
                name: LENGTH_OF_STAY,
                partition: Partition::LengthOfStay(bounds.clone()),
            });
        }
        Ok(out)
    }

    /// Events counted by this plan.
    pub fn events<'a>(&self, dataset: &'a Dataset, dims: &[Dimension]) -> Result<Vec<Event<'a>>> {
        let visits = dataset.visits()?;
        let ctx = VisitContext::new(dataset, dims)?;
        match (self.family, self.domain) {
            (_, ProbeDomain::Visit) | (CompletenessAlgorithm::PerRelatedEvent, _) => {
                Ok(visit_events(visits, dims, &ctx))
            }
            (CompletenessAlgorithm::PerEntityNormalized, domain) => {
                secondary_events(dataset, domain, dims, &ctx, &live_visits(visits), false)
            }
        }
    }

    /// Secondary events linked to visits, bucketed at their visit's month.
    pub fn linked_events<'a>(
        &self,
        dataset: &'a Dataset,
        dims: &[Dimension],
    ) -> Result<Vec<Event<'a>>> {
        let visits = live_visits(dataset.visits()?);
        let ctx = VisitContext::new(dataset, dims)?;
        secondary_events(dataset, self.domain, dims, &ctx, &visits, true)
    }
}

/// A dataset record reduced to what aggregation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<'a> {
    pub id: i64,
    pub visit: VisitId,
    pub care_site_id: CareSiteId,
    pub date: NaiveDate,
    /// Raw value per active dimension.
    pub values: Vec<Option<Cow<'a, str>>>,
}

fn live_visits(visits: &[VisitRecord]) -> HashMap<VisitId, &VisitRecord> {
    visits
        .iter()
        .filter(|v| !is_deleted(v.row_status_source_value.as_deref()))
        .map(|v| (v.visit_occurrence_id, v))
        .collect()
}

fn visit_events<'a>(
    visits: &'a [VisitRecord],
    dims: &[Dimension],
    ctx: &VisitContext<'a>,
) -> Vec<Event<'a>> {
    visits
        .iter()
        .filter(|v| !is_deleted(v.row_status_source_value.as_deref()))
        .map(|v| Event {
            id: v.visit_occurrence_id.0,
            visit: v.visit_occurrence_id,
            care_site_id: v.care_site_id,
            date: v.visit_start_datetime,
            values: dims.iter().map(|d| ctx.value(d, v)).collect(),
        })
        .collect()
}

/// A secondary record before the visit join.
#[derive(Clone, Copy)]
enum Secondary<'a> {
    Note(&'a NoteRecord),
    Condition(&'a ConditionRecord),
    Measurement(&'a MeasurementRecord),
}

impl<'a> Secondary<'a> {
    fn id(self) -> i64 {
        match self {
            Secondary::Note(n) => n.note_id,
            Secondary::Condition(c) => c.condition_occurrence_id,
            Secondary::Measurement(m) => m.measurement_id,
        }
    }

    fn visit(self) -> VisitId {
        match self {
            Secondary::Note(n) => n.visit_occurrence_id,
            Secondary::Condition(c) => c.visit_occurrence_id,
            Secondary::Measurement(m) => m.visit_occurrence_id,
        }
    }

    fn date(self) -> NaiveDate {
        match self {
            Secondary::Note(n) => n.note_datetime,
            Secondary::Condition(c) => c.condition_start_datetime,
            Secondary::Measurement(m) => m.measurement_date,
        }
    }

    fn row_status(self) -> Option<&'a str> {
        match self {
            Secondary::Note(n) => n.row_status_source_value.as_deref(),
            Secondary::Condition(c) => c.row_status_source_value.as_deref(),
            Secondary::Measurement(m) => m.row_status_source_value.as_deref(),
        }
    }

    fn field(self, dim: &str) -> Option<&'a str> {
        match (self, dim) {
            (Secondary::Note(n), "note_type") => n.note_class_source_value.as_deref(),
            (Secondary::Condition(c), "diag_type") => c.condition_status_source_value.as_deref(),
            (Secondary::Condition(c), "condition_type") => c.condition_source_value.as_deref(),
            (Secondary::Condition(c), "source_system") => c.cdm_source.as_deref(),
            (Secondary::Measurement(m), "concepts_set") => m.measurement_source_value.as_deref(),
            _ => None,
        }
    }
}

fn secondary_events<'a>(
    dataset: &'a Dataset,
    domain: ProbeDomain,
    dims: &[Dimension],
    ctx: &VisitContext<'a>,
    visits: &HashMap<VisitId, &'a VisitRecord>,
    at_visit_date: bool,
) -> Result<Vec<Event<'a>>> {
    let records: Vec<Secondary<'a>> = match domain {
        ProbeDomain::Visit => Vec::new(),
        ProbeDomain::Note => dataset.notes()?.iter().map(Secondary::Note).collect(),
        ProbeDomain::Condition => dataset
            .conditions()?
            .iter()
            .map(Secondary::Condition)
            .collect(),
        ProbeDomain::Biology => dataset
            .measurements()?
            .iter()
            .map(Secondary::Measurement)
            .collect(),
    };

    // Records whose visit is unknown or deleted are dropped.
    Ok(records
        .into_iter()
        .filter(|rec| !is_deleted(rec.row_status()))
        .filter_map(|rec| {
            let visit = visits.get(&rec.visit()).copied()?;
            Some(Event {
                id: rec.id(),
                visit: rec.visit(),
                care_site_id: visit.care_site_id,
                date: if at_visit_date {
                    visit.visit_start_datetime
                } else {
                    rec.date()
                },
                values: dims
                    .iter()
                    .map(|d| {
                        if is_visit_dimension(d.name) {
                            ctx.value(d, visit)
                        } else {
                            rec.field(d.name).map(Cow::Borrowed)
                        }
                    })
                    .collect(),
            })
        })
        .collect())
}
