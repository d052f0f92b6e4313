//! Partition dimensions.
//!
//! A label dimension matches a raw string field against ordered rules and
//! replicates the event into every matching group. A binned dimension
//! places a numeric field into exactly one range; its extracted value is
//! already the range label.
//!
//! Visit-side dimensions are read from the visit, its patient or its care
//! site, and apply to every domain.

use std::borrow::Cow;
use std::collections::HashMap;

use es_common::{CareSiteId, LabelMapping, Result};

use crate::data::{Dataset, PersonRecord, VisitRecord};

pub const STAY_TYPE: &str = "stay_type";
pub const PROVENANCE_SOURCE: &str = "provenance_source";
pub const STAY_SOURCE: &str = "stay_source";
pub const CARE_SITES_SET: &str = "care_sites_set";
pub const GENDER: &str = "gender_source_value";
pub const AGE_RANGE: &str = "age_range";
pub const LENGTH_OF_STAY: &str = "length_of_stay";

pub const VISIT_DIMENSIONS: &[&str] = &[
    STAY_TYPE,
    PROVENANCE_SOURCE,
    STAY_SOURCE,
    CARE_SITES_SET,
    GENDER,
    AGE_RANGE,
    LENGTH_OF_STAY,
];

pub fn is_visit_dimension(name: &str) -> bool {
    VISIT_DIMENSIONS.contains(&name)
}

#[derive(Debug, Clone)]
pub enum Partition {
    Labels(LabelMapping),
    /// Age bounds in years.
    AgeRange(Vec<u32>),
    /// Length-of-stay bounds in days.
    LengthOfStay(Vec<f64>),
}

/// An active dimension.
#[derive(Debug, Clone)]
pub struct Dimension {
    pub name: &'static str,
    pub partition: Partition,
}

impl Dimension {
    pub fn labels(name: &'static str, mapping: LabelMapping) -> Self {
        Dimension {
            name,
            partition: Partition::Labels(mapping),
        }
    }

    /// Group labels an extracted value falls into, in rule order.
    pub fn classify<'v>(&'v self, value: &'v str) -> Vec<&'v str> {
        match &self.partition {
            Partition::Labels(mapping) => mapping.matching_labels(value).collect(),
            Partition::AgeRange(_) | Partition::LengthOfStay(_) => vec![value],
        }
    }

    fn reads_person(&self) -> bool {
        matches!(self.partition, Partition::AgeRange(_)) || self.name == GENDER
    }
}

/// Age bin: `age <= b0`, `b0 < age <= b1`, ..., `age > bn`.
pub fn age_range_label(age: Option<u32>, bounds: &[u32]) -> String {
    let (Some(age), Some(&first), Some(&last)) = (age, bounds.first(), bounds.last()) else {
        return "Unknown".to_string();
    };
    if age <= first {
        return format!("age <= {}", first);
    }
    if age > last {
        return format!("age > {}", last);
    }
    bounds
        .windows(2)
        .find(|w| w[0] < age && age <= w[1])
        .map(|w| format!("{} < age <= {}", w[0], w[1]))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Length-of-stay bin: `< b0 days`, `b0 days - b1 days`, ..., `>= bn days`.
///
/// Open stays are `Incomplete stay`; an end before the start is `Unknown`.
pub fn length_of_stay_label(days: Option<i64>, bounds: &[f64]) -> String {
    let Some(days) = days else {
        return "Incomplete stay".to_string();
    };
    let (Some(&first), Some(&last)) = (bounds.first(), bounds.last()) else {
        return "Unknown".to_string();
    };
    if days < 0 {
        return "Unknown".to_string();
    }
    let days = days as f64;
    if days < first {
        return format!("< {} days", first);
    }
    if days >= last {
        return format!(">= {} days", last);
    }
    bounds
        .windows(2)
        .find(|w| w[0] <= days && days < w[1])
        .map(|w| format!("{} days - {} days", w[0], w[1]))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Lookups backing visit-side dimensions.
///
/// The person table is only required when a dimension reads it, and the
/// care-site table only when care-site sets are active.
pub struct VisitContext<'a> {
    persons: HashMap<i64, &'a PersonRecord>,
    site_names: HashMap<CareSiteId, &'a str>,
}

impl<'a> VisitContext<'a> {
    pub fn new(dataset: &'a Dataset, dims: &[Dimension]) -> Result<Self> {
        let persons = if dims.iter().any(Dimension::reads_person) {
            dataset
                .persons()?
                .iter()
                .map(|p| (p.person_id, p))
                .collect()
        } else {
            HashMap::new()
        };
        let site_names = if dims.iter().any(|d| d.name == CARE_SITES_SET) {
            dataset
                .care_sites()?
                .iter()
                .map(|s| (s.care_site_id, s.care_site_short_name.as_str()))
                .collect()
        } else {
            HashMap::new()
        };
        Ok(VisitContext {
            persons,
            site_names,
        })
    }

    fn person(&self, visit: &VisitRecord) -> Option<&'a PersonRecord> {
        self.persons.get(&visit.person_id?).copied()
    }

    /// Raw value of a visit-side dimension; `None` for other dimensions.
    pub fn value(&self, dim: &Dimension, visit: &'a VisitRecord) -> Option<Cow<'a, str>> {
        match &dim.partition {
            Partition::AgeRange(bounds) => {
                let age = self
                    .person(visit)
                    .and_then(|p| p.age_at(visit.visit_start_datetime));
                Some(Cow::Owned(age_range_label(age, bounds)))
            }
            Partition::LengthOfStay(bounds) => Some(Cow::Owned(length_of_stay_label(
                visit.length_of_stay_days(),
                bounds,
            ))),
            Partition::Labels(_) => {
                let raw = match dim.name {
                    STAY_TYPE => visit.visit_source_value.as_deref(),
                    PROVENANCE_SOURCE => visit.provenance_source_value.as_deref(),
                    STAY_SOURCE => visit.stay_source_value.as_deref(),
                    CARE_SITES_SET => self.site_names.get(&visit.care_site_id).copied(),
                    GENDER => self
                        .person(visit)
                        .and_then(|p| p.gender_source_value.as_deref()),
                    _ => None,
                };
                raw.map(Cow::Borrowed)
            }
        }
    }
}
