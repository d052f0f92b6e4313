//! Completeness series produced by a probe.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use es_common::{CareSiteId, CareSiteLevel};
use es_config::{PredictorAlgorithm, ProbeDomain};
use es_store::{Column, FlatTable, TableName};
use serde::{Deserialize, Serialize};

/// Non-time key of a completeness series.
///
/// `labels` is aligned with the owning predictor's `label_dimensions`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub care_site_level: CareSiteLevel,
    pub care_site_id: CareSiteId,
    pub care_site_short_name: String,
    pub labels: Vec<String>,
}

impl SeriesKey {
    /// Same key restricted to the label positions in `keep`.
    pub fn project(&self, keep: &[usize]) -> SeriesKey {
        SeriesKey {
            care_site_level: self.care_site_level,
            care_site_id: self.care_site_id,
            care_site_short_name: self.care_site_short_name.clone(),
            labels: keep.iter().map(|&i| self.labels[i].clone()).collect(),
        }
    }
}

/// One (key, month) observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorRow {
    pub key: SeriesKey,
    pub date: NaiveDate,
    /// Additive raw counts, aligned with `count_columns`.
    pub counts: Vec<u64>,
    /// Completeness ratio in [0, 1].
    pub c: f64,
}

/// Completeness series for every key, sorted by key then month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predictor {
    pub domain: ProbeDomain,
    pub algorithm: PredictorAlgorithm,
    pub label_dimensions: Vec<String>,
    pub count_columns: Vec<String>,
    pub rows: Vec<PredictorRow>,
}

impl Predictor {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn sort(&mut self) {
        self.rows
            .sort_by(|a, b| a.key.cmp(&b.key).then(a.date.cmp(&b.date)));
    }

    /// Rows grouped by key, each group in month order.
    pub fn series(&self) -> BTreeMap<&SeriesKey, Vec<&PredictorRow>> {
        let mut out: BTreeMap<&SeriesKey, Vec<&PredictorRow>> = BTreeMap::new();
        for row in &self.rows {
            out.entry(&row.key).or_default().push(row);
        }
        for rows in out.values_mut() {
            rows.sort_by_key(|r| r.date);
        }
        out
    }

    pub fn num_series(&self) -> usize {
        self.series().len()
    }

    /// Flat table: key columns, one column per label dimension, `date`,
    /// the count columns, then `c`.
    pub fn to_table(&self) -> FlatTable {
        let keys = self.rows.iter().map(|r| &r.key);
        let mut table = key_columns(TableName::Predictor, &self.label_dimensions, keys)
            .with_column(
                "date",
                Column::Date(self.rows.iter().map(|r| Some(r.date)).collect()),
            );
        for (i, name) in self.count_columns.iter().enumerate() {
            table = table.with_column(
                name.clone(),
                Column::Int64(
                    self.rows
                        .iter()
                        .map(|r| r.counts.get(i).map(|&n| n as i64))
                        .collect(),
                ),
            );
        }
        table.with_column(
            "c",
            Column::Float64(self.rows.iter().map(|r| Some(r.c)).collect()),
        )
    }
}

/// Key columns shared by the predictor, estimates and predictions tables.
pub(crate) fn key_columns<'a>(
    name: TableName,
    label_dimensions: &[String],
    keys: impl Iterator<Item = &'a SeriesKey> + Clone,
) -> FlatTable {
    let mut table = FlatTable::new(name)
        .with_column(
            "care_site_level",
            Column::Utf8(
                keys.clone()
                    .map(|k| Some(k.care_site_level.as_str().to_string()))
                    .collect(),
            ),
        )
        .with_column(
            "care_site_id",
            Column::Int64(keys.clone().map(|k| Some(k.care_site_id.0)).collect()),
        )
        .with_column(
            "care_site_short_name",
            Column::Utf8(
                keys.clone()
                    .map(|k| Some(k.care_site_short_name.clone()))
                    .collect(),
            ),
        );
    for (i, dim) in label_dimensions.iter().enumerate() {
        table = table.with_column(
            dim.clone(),
            Column::Utf8(keys.clone().map(|k| k.labels.get(i).cloned()).collect()),
        );
    }
    table
}
