//! Input dataset: the raw tables a probe aggregates.
//!
//! Tables are optional in the document; each probe algorithm asks for the
//! ones it needs and gets `MissingTable` when one is absent.

use std::path::Path;

use chrono::NaiveDate;
use es_common::month::{deserialize_event_date, deserialize_optional_event_date};
use es_common::{CareSite, CareSiteId, Error, Result, VisitId};
use serde::{Deserialize, Serialize};

/// Row-status values marking a record as deleted.
const DELETED_MARKERS: &[&str] = &["supprim", "deleted", "cancel"];

/// True when a row-status value marks the record as deleted.
pub fn is_deleted(row_status: Option<&str>) -> bool {
    row_status.is_some_and(|s| {
        let s = s.to_lowercase();
        DELETED_MARKERS.iter().any(|m| s.contains(m))
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub visit_occurrence_id: VisitId,
    pub care_site_id: CareSiteId,
    #[serde(deserialize_with = "deserialize_event_date")]
    pub visit_start_datetime: NaiveDate,
    /// Absent while the stay is still open.
    #[serde(default, deserialize_with = "deserialize_optional_event_date")]
    pub visit_end_datetime: Option<NaiveDate>,
    #[serde(default)]
    pub person_id: Option<i64>,
    /// Stay type (hospitalisation, urgence, consultation...).
    #[serde(default)]
    pub visit_source_value: Option<String>,
    /// Where the patient came from (home, emergency department, transfer...).
    #[serde(default)]
    pub provenance_source_value: Option<String>,
    /// Stay source (MCO, SSR, psychiatry...).
    #[serde(default)]
    pub stay_source_value: Option<String>,
    #[serde(default)]
    pub row_status_source_value: Option<String>,
}

impl VisitRecord {
    /// Whole days between visit start and end, `None` for open stays.
    pub fn length_of_stay_days(&self) -> Option<i64> {
        self.visit_end_datetime
            .map(|end| (end - self.visit_start_datetime).num_days())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub person_id: i64,
    #[serde(default, deserialize_with = "deserialize_optional_event_date")]
    pub birth_datetime: Option<NaiveDate>,
    #[serde(default)]
    pub gender_source_value: Option<String>,
}

impl PersonRecord {
    /// Completed years at `date`, `None` when unknown or before birth.
    pub fn age_at(&self, date: NaiveDate) -> Option<u32> {
        date.years_since(self.birth_datetime?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub note_id: i64,
    pub visit_occurrence_id: VisitId,
    #[serde(deserialize_with = "deserialize_event_date")]
    pub note_datetime: NaiveDate,
    #[serde(default)]
    pub note_class_source_value: Option<String>,
    #[serde(default)]
    pub row_status_source_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRecord {
    pub condition_occurrence_id: i64,
    pub visit_occurrence_id: VisitId,
    #[serde(deserialize_with = "deserialize_event_date")]
    pub condition_start_datetime: NaiveDate,
    /// Diagnosis code (ICD-10).
    #[serde(default)]
    pub condition_source_value: Option<String>,
    /// Diagnosis type (DP, DR, DAS...).
    #[serde(default)]
    pub condition_status_source_value: Option<String>,
    /// Source system the code was recorded in.
    #[serde(default)]
    pub cdm_source: Option<String>,
    #[serde(default)]
    pub row_status_source_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub measurement_id: i64,
    pub visit_occurrence_id: VisitId,
    #[serde(deserialize_with = "deserialize_event_date")]
    pub measurement_date: NaiveDate,
    /// Laboratory concept code.
    #[serde(default)]
    pub measurement_source_value: Option<String>,
    #[serde(default)]
    pub row_status_source_value: Option<String>,
}

/// Raw tables keyed by their usual names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub care_site: Option<Vec<CareSite>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<Vec<PersonRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_occurrence: Option<Vec<VisitRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Vec<NoteRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_occurrence: Option<Vec<ConditionRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement: Option<Vec<MeasurementRecord>>,
}

fn require<'a, T>(table: &'a Option<Vec<T>>, name: &str) -> Result<&'a [T]> {
    table
        .as_deref()
        .ok_or_else(|| Error::MissingTable(name.to_string()))
}

impl Dataset {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn care_sites(&self) -> Result<&[CareSite]> {
        require(&self.care_site, "care_site")
    }

    pub fn persons(&self) -> Result<&[PersonRecord]> {
        require(&self.person, "person")
    }

    pub fn visits(&self) -> Result<&[VisitRecord]> {
        require(&self.visit_occurrence, "visit_occurrence")
    }

    pub fn notes(&self) -> Result<&[NoteRecord]> {
        require(&self.note, "note")
    }

    pub fn conditions(&self) -> Result<&[ConditionRecord]> {
        require(&self.condition_occurrence, "condition_occurrence")
    }

    pub fn measurements(&self) -> Result<&[MeasurementRecord]> {
        require(&self.measurement, "measurement")
    }

    /// Row counts per present table, for logging.
    pub fn table_sizes(&self) -> Vec<(&'static str, usize)> {
        [
            ("care_site", self.care_site.as_ref().map(Vec::len)),
            ("person", self.person.as_ref().map(Vec::len)),
            ("visit_occurrence", self.visit_occurrence.as_ref().map(Vec::len)),
            ("note", self.note.as_ref().map(Vec::len)),
            (
                "condition_occurrence",
                self.condition_occurrence.as_ref().map(Vec::len),
            ),
            ("measurement", self.measurement.as_ref().map(Vec::len)),
        ]
        .into_iter()
        .filter_map(|(name, len)| len.map(|l| (name, l)))
        .collect()
    }
}
