//! Fitted estimates and predictions as tables.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use es_config::{CurveShape, MetricName};
use es_store::{Column, FlatTable, TableName};
use serde::{Deserialize, Serialize};

use super::shape::Coefficients;
use crate::probe::predictor::key_columns;
use crate::probe::SeriesKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateRow {
    pub key: SeriesKey,
    pub coefficients: Coefficients,
    /// `None` marks a metric whose region is empty.
    pub metrics: BTreeMap<MetricName, Option<f64>>,
}

impl EstimateRow {
    pub fn metric(&self, name: MetricName) -> Option<f64> {
        self.metrics.get(&name).copied().flatten()
    }
}

/// Estimates for every fitted key, in key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimates {
    pub shape: CurveShape,
    pub label_dimensions: Vec<String>,
    pub metrics: Vec<MetricName>,
    pub rows: Vec<EstimateRow>,
}

impl Estimates {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&EstimateRow> {
        self.rows
            .binary_search_by(|row| row.key.cmp(key))
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Flat table: key columns, label columns, `t0`, `c0`, `t1` for
    /// rectangles, then one column per metric.
    pub fn to_table(&self) -> FlatTable {
        let keys = self.rows.iter().map(|r| &r.key);
        let mut table = key_columns(TableName::Estimates, &self.label_dimensions, keys)
            .with_column(
                "t0",
                Column::Date(self.rows.iter().map(|r| r.coefficients.t0).collect()),
            )
            .with_column(
                "c0",
                Column::Float64(self.rows.iter().map(|r| Some(r.coefficients.c0)).collect()),
            );
        if self.shape == CurveShape::Rectangle {
            table = table.with_column(
                "t1",
                Column::Date(self.rows.iter().map(|r| r.coefficients.t1).collect()),
            );
        }
        for metric in &self.metrics {
            table = table.with_column(
                metric.as_str(),
                Column::Float64(self.rows.iter().map(|r| r.metric(*metric)).collect()),
            );
        }
        table
    }
}

/// Fitted curve value next to the observed ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub key: SeriesKey,
    pub date: NaiveDate,
    pub c: f64,
    pub c_hat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    pub label_dimensions: Vec<String>,
    pub rows: Vec<PredictionRow>,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_table(&self) -> FlatTable {
        let keys = self.rows.iter().map(|r| &r.key);
        key_columns(TableName::Predictions, &self.label_dimensions, keys)
            .with_column(
                "date",
                Column::Date(self.rows.iter().map(|r| Some(r.date)).collect()),
            )
            .with_column(
                "c",
                Column::Float64(self.rows.iter().map(|r| Some(r.c)).collect()),
            )
            .with_column(
                "c_hat",
                Column::Float64(self.rows.iter().map(|r| Some(r.c_hat)).collect()),
            )
    }
}
