//! Completeness probe.
//!
//! A probe aggregates dataset records into one completeness ratio per
//! (care site, label combination, month). The computed series is kept
//! aside so that in-place filters can be undone with
//! [`Probe::reset_predictor`].

pub mod aggregate;
pub mod dimension;
pub mod domain;
pub mod predictor;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::NaiveDate;
use es_common::{CareSite, CareSiteId, Error, Result};
use es_config::ProbeConfig;
use es_store::FlatTable;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use aggregate::Window;
pub use dimension::{Dimension, Partition, VISIT_DIMENSIONS};
pub use domain::{AlgorithmPlan, CompletenessAlgorithm};
pub use predictor::{Predictor, PredictorRow, SeriesKey};

use crate::artifact::{self, ArtifactKind};
use crate::data::Dataset;
use crate::hierarchy::{resolve_levels, CareSiteHierarchy};
use crate::logging::event_names;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Probe {
    pub config: ProbeConfig,
    care_sites: Vec<CareSite>,
    computed: Option<Predictor>,
    predictor: Option<Predictor>,
}

impl Probe {
    pub fn new(config: ProbeConfig) -> Self {
        Probe {
            config,
            ..Probe::default()
        }
    }

    /// Wrap an already computed series, e.g. one built outside `compute`.
    ///
    /// `care_sites` backs later calls to [`Probe::filter_care_site`].
    pub fn from_predictor(
        config: ProbeConfig,
        care_sites: Vec<CareSite>,
        predictor: Predictor,
    ) -> Self {
        Probe {
            config,
            care_sites,
            computed: Some(predictor.clone()),
            predictor: Some(predictor),
        }
    }

    /// Validate the configuration without touching data.
    pub fn plan(&self) -> Result<AlgorithmPlan> {
        if let (Some(start), Some(end)) = (self.config.start_date, self.config.end_date) {
            if start >= end {
                return Err(Error::InvalidDateWindow {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        AlgorithmPlan::new(self.config.domain, self.config.algorithm)
    }

    /// Aggregate `dataset` into the completeness series.
    ///
    /// Replaces any previous result. When care-site ids or short names are
    /// configured, the result is narrowed with the same closure semantics
    /// as [`Probe::filter_care_site`].
    pub fn compute(&mut self, dataset: &Dataset) -> Result<&Predictor> {
        let plan = self.plan()?;
        let dims = plan.dimensions_for(&self.config)?;
        let levels = resolve_levels(&self.config.care_site_levels)?;
        let care_sites = dataset.care_sites()?.to_vec();
        let hierarchy = CareSiteHierarchy::new(care_sites.iter().cloned())?;

        info!(
            event = event_names::PROBE_COMPUTE_STARTED,
            domain = %plan.domain,
            algorithm = %plan.algorithm,
            dimensions = dims.len(),
            levels = levels.len(),
            "computing completeness"
        );

        let grouping = aggregate::Grouping {
            hierarchy: &hierarchy,
            levels: &levels,
            window: Window {
                start: self.config.start_date,
                end: self.config.end_date,
            },
        };
        let events = plan.events(dataset, &dims)?;
        let rows = match plan.family {
            CompletenessAlgorithm::PerEntityNormalized => {
                aggregate::per_entity_normalized(&grouping, &events, &dims, self.config.normalizer)
            }
            CompletenessAlgorithm::PerRelatedEvent => {
                let linked = plan.linked_events(dataset, &dims)?;
                let primary: Vec<usize> = dims
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| dimension::is_visit_dimension(d.name))
                    .map(|(i, _)| i)
                    .collect();
                aggregate::per_related_event(&grouping, &events, &linked, &dims, &primary)
            }
        };

        let mut predictor = Predictor {
            domain: plan.domain,
            algorithm: plan.algorithm,
            label_dimensions: dims.iter().map(|d| d.name.to_string()).collect(),
            count_columns: plan.count_columns.iter().map(|c| c.to_string()).collect(),
            rows,
        };

        if !self.config.care_site_ids.is_empty() || !self.config.care_site_short_names.is_empty() {
            let ids: Vec<CareSiteId> = self
                .config
                .care_site_ids
                .iter()
                .copied()
                .map(CareSiteId)
                .collect();
            let kept = hierarchy.closure(&self.config.care_site_short_names, &ids);
            predictor.rows.retain(|r| kept.contains(&r.key.care_site_id));
        }
        predictor.sort();

        info!(
            event = event_names::PROBE_COMPUTE_FINISHED,
            events = events.len(),
            series = predictor.num_series(),
            rows = predictor.len(),
            "completeness computed"
        );

        self.care_sites = care_sites;
        self.computed = Some(predictor.clone());
        Ok(&*self.predictor.insert(predictor))
    }

    pub fn is_computed(&self) -> bool {
        self.predictor.is_some()
    }

    pub fn predictor(&self) -> Result<&Predictor> {
        self.predictor.as_ref().ok_or(Error::NotComputed)
    }

    fn predictor_mut(&mut self) -> Result<&mut Predictor> {
        self.predictor.as_mut().ok_or(Error::NotComputed)
    }

    /// Narrow the series in place to the hierarchy closure of the selection.
    ///
    /// An empty selection leaves the series untouched. A selection that
    /// matches no known care site empties it.
    pub fn filter_care_site(&mut self, short_names: &[String], ids: &[CareSiteId]) -> Result<()> {
        if short_names.is_empty() && ids.is_empty() {
            self.predictor()?;
            return Ok(());
        }
        let hierarchy = CareSiteHierarchy::new(self.care_sites.iter().cloned())?;
        let kept: BTreeSet<CareSiteId> = hierarchy.closure(short_names, ids);
        let predictor = self.predictor_mut()?;
        let before = predictor.len();
        predictor.rows.retain(|r| kept.contains(&r.key.care_site_id));

        info!(
            event = event_names::PROBE_FILTERED,
            filter = "care_site",
            kept_sites = kept.len(),
            rows_before = before,
            rows_after = predictor.len(),
            "filtered predictor by care site"
        );
        Ok(())
    }

    /// Keep, per series, only the months between the first and last month
    /// with a positive primary count.
    pub fn filter_date_per_care_site(&mut self) -> Result<()> {
        let predictor = self.predictor_mut()?;
        let before = predictor.len();

        let mut bounds: BTreeMap<SeriesKey, (NaiveDate, NaiveDate)> = BTreeMap::new();
        let active = predictor
            .rows
            .iter()
            .filter(|r| r.counts.first().is_some_and(|&n| n > 0));
        for row in active {
            bounds
                .entry(row.key.clone())
                .and_modify(|(first, last)| {
                    *first = (*first).min(row.date);
                    *last = (*last).max(row.date);
                })
                .or_insert((row.date, row.date));
        }
        predictor.rows.retain(|r| {
            bounds
                .get(&r.key)
                .is_some_and(|(first, last)| r.date >= *first && r.date <= *last)
        });

        info!(
            event = event_names::PROBE_FILTERED,
            filter = "date_per_care_site",
            rows_before = before,
            rows_after = predictor.len(),
            "trimmed series to active months"
        );
        Ok(())
    }

    /// Restore the series produced by the last `compute`.
    pub fn reset_predictor(&mut self) -> Result<()> {
        let computed = self.computed.clone().ok_or(Error::NotComputed)?;
        debug!(event = event_names::PROBE_RESET, rows = computed.len(), "predictor reset");
        self.predictor = Some(computed);
        Ok(())
    }

    pub fn to_table(&self) -> Result<FlatTable> {
        Ok(self.predictor()?.to_table())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        artifact::save(path, ArtifactKind::Probe, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        artifact::load(path, ArtifactKind::Probe)
    }
}
