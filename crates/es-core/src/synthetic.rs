//! Synthetic dataset generator.
//!
//! Builds a full Hospital → Pole → UF tree and a visit table in which each
//! unit switches on at a known month. Used by tests, benches and the
//! `synth` command.
//!
//! ```ignore
//! use es_core::synthetic::SyntheticConfig;
//!
//! let data = SyntheticConfig::default()
//!     .hospitals(2)
//!     .deployment(vec![0, 6, 12])
//!     .seed(7)
//!     .generate();
//! ```

use chrono::{Days, Months, NaiveDate};
use es_common::{CareSite, CareSiteId, CareSiteLevel, VisitId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{Dataset, VisitRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub hospitals: usize,
    pub poles_per_hospital: usize,
    pub units_per_pole: usize,
    /// First month of the visit table.
    pub start: NaiveDate,
    pub months: usize,
    pub visits_per_month: u32,
    /// Raw stay types drawn uniformly; empty leaves the field null.
    pub stay_types: Vec<String>,
    /// Month offset at which each unit starts recording, cycled over units.
    pub deployment: Vec<u32>,
    /// Relative jitter applied to monthly visit counts, in [0, 1).
    pub noise: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        SyntheticConfig {
            hospitals: 1,
            poles_per_hospital: 1,
            units_per_pole: 3,
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            months: 24,
            visits_per_month: 20,
            stay_types: vec!["hospitalisés".to_string(), "urgence".to_string()],
            deployment: vec![0, 6, 12],
            noise: 0.0,
            seed: 42,
        }
    }
}

/// A generated unit and the month its records start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub care_site_id: CareSiteId,
    pub short_name: String,
    pub month: NaiveDate,
}

impl SyntheticConfig {
    pub fn hospitals(mut self, n: usize) -> Self {
        self.hospitals = n;
        self
    }

    pub fn poles_per_hospital(mut self, n: usize) -> Self {
        self.poles_per_hospital = n;
        self
    }

    pub fn units_per_pole(mut self, n: usize) -> Self {
        self.units_per_pole = n;
        self
    }

    pub fn start(mut self, start: NaiveDate) -> Self {
        self.start = start;
        self
    }

    pub fn months(mut self, months: usize) -> Self {
        self.months = months;
        self
    }

    pub fn visits_per_month(mut self, n: u32) -> Self {
        self.visits_per_month = n;
        self
    }

    pub fn stay_types(mut self, types: Vec<String>) -> Self {
        self.stay_types = types;
        self
    }

    pub fn deployment(mut self, offsets: Vec<u32>) -> Self {
        self.deployment = offsets;
        self
    }

    pub fn noise(mut self, noise: f64) -> Self {
        self.noise = noise.clamp(0.0, 0.99);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn care_sites(&self) -> (Vec<CareSite>, Vec<(CareSiteId, String)>) {
        let mut sites = Vec::new();
        let mut units = Vec::new();
        let mut next_id = 1i64;
        let mut push = |sites: &mut Vec<CareSite>, name: String, level: CareSiteLevel, parent| {
            let id = CareSiteId(next_id);
            next_id += 1;
            sites.push(CareSite {
                care_site_id: id,
                care_site_short_name: name,
                care_site_level: level.display_name().to_string(),
                parent_id: parent,
            });
            id
        };

        for h in 1..=self.hospitals {
            let hospital = push(&mut sites, format!("Hôpital-{}", h), CareSiteLevel::Hospital, None);
            for p in 1..=self.poles_per_hospital {
                let pole = push(
                    &mut sites,
                    format!("Pôle-{}-{}", h, p),
                    CareSiteLevel::Pole,
                    Some(hospital),
                );
                for u in 1..=self.units_per_pole {
                    let name = format!("UF-{}-{}-{}", h, p, u);
                    let unit = push(&mut sites, name.clone(), CareSiteLevel::Uf, Some(pole));
                    units.push((unit, name));
                }
            }
        }
        (sites, units)
    }

    fn month(&self, offset: usize) -> NaiveDate {
        self.start
            .checked_add_months(Months::new(offset as u32))
            .unwrap_or(self.start)
    }

    /// Deployment month of every unit, in generation order.
    pub fn deployments(&self) -> Vec<Deployment> {
        let (_, units) = self.care_sites();
        units
            .into_iter()
            .enumerate()
            .map(|(k, (care_site_id, short_name))| Deployment {
                care_site_id,
                short_name,
                month: self.month(self.offset_for(k) as usize),
            })
            .collect()
    }

    fn offset_for(&self, unit_index: usize) -> u32 {
        if self.deployment.is_empty() {
            0
        } else {
            self.deployment[unit_index % self.deployment.len()]
        }
    }

    pub fn generate(&self) -> Dataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let (care_sites, units) = self.care_sites();
        let mut visits = Vec::new();
        let mut next_visit = 1i64;

        for (k, (unit, _)) in units.iter().enumerate() {
            let deploy = self.offset_for(k) as usize;
            for offset in deploy..self.months {
                let month = self.month(offset);
                let mut count = self.visits_per_month as f64;
                if self.noise > 0.0 {
                    count *= 1.0 + rng.random_range(-self.noise..=self.noise);
                }
                for _ in 0..count.round().max(0.0) as u64 {
                    let day = rng.random_range(0..28u64);
                    let stay_type = if self.stay_types.is_empty() {
                        None
                    } else {
                        let i = rng.random_range(0..self.stay_types.len());
                        Some(self.stay_types[i].clone())
                    };
                    visits.push(VisitRecord {
                        visit_occurrence_id: VisitId(next_visit),
                        care_site_id: *unit,
                        visit_start_datetime: month.checked_add_days(Days::new(day)).unwrap_or(month),
                        visit_end_datetime: None,
                        person_id: None,
                        visit_source_value: stay_type,
                        provenance_source_value: None,
                        stay_source_value: None,
                        row_status_source_value: None,
                    });
                    next_visit += 1;
                }
            }
        }

        Dataset {
            care_site: Some(care_sites),
            visit_occurrence: Some(visits),
            ..Dataset::default()
        }
    }
}
