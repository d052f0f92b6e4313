//! Flat table model and its Arrow representation.
//!
//! Tables persisted by the pipeline:
//! - `predictor`: monthly completeness per series
//! - `estimates`: fitted coefficients and metrics per series
//! - `predictions`: observed and modelled completeness per series and month

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Date32Array, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::util::pretty::pretty_format_batches;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::writer::StoreError;

/// Table names for pipeline storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Predictor,
    Estimates,
    Predictions,
}

impl TableName {
    /// Get the string name used for file stems.
    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Predictor => "predictor",
            TableName::Estimates => "estimates",
            TableName::Predictions => "predictions",
        }
    }

    /// Default maximum rows per row group for this table.
    pub fn row_group_size(&self) -> usize {
        match self {
            TableName::Predictor => 64 * 1024,
            TableName::Estimates => 8 * 1024,
            TableName::Predictions => 64 * 1024,
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single nullable column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Utf8(Vec<Option<String>>),
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Date(Vec<Option<NaiveDate>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Utf8(v) => v.len(),
            Column::Int64(v) => v.len(),
            Column::Float64(v) => v.len(),
            Column::Date(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Arrow type this column is stored as.
    pub fn data_type(&self) -> DataType {
        match self {
            Column::Utf8(_) => DataType::Utf8,
            Column::Int64(_) => DataType::Int64,
            Column::Float64(_) => DataType::Float64,
            Column::Date(_) => DataType::Date32,
        }
    }

    fn to_array(&self) -> ArrayRef {
        match self {
            Column::Utf8(v) => Arc::new(StringArray::from(
                v.iter().map(|s| s.as_deref()).collect::<Vec<_>>(),
            )),
            Column::Int64(v) => Arc::new(Int64Array::from(v.clone())),
            Column::Float64(v) => Arc::new(Float64Array::from(v.clone())),
            Column::Date(v) => Arc::new(Date32Array::from(
                v.iter().map(|d| d.map(date_to_days)).collect::<Vec<_>>(),
            )),
        }
    }

    fn from_array(name: &str, array: &dyn Array) -> Result<Self, StoreError> {
        let mismatch = || StoreError::Schema(format!("column {} has unexpected layout", name));
        match array.data_type() {
            DataType::Utf8 => {
                let a = array.as_any().downcast_ref::<StringArray>().ok_or_else(mismatch)?;
                Ok(Column::Utf8(
                    a.iter().map(|v| v.map(str::to_string)).collect(),
                ))
            }
            DataType::Int64 => {
                let a = array.as_any().downcast_ref::<Int64Array>().ok_or_else(mismatch)?;
                Ok(Column::Int64(a.iter().collect()))
            }
            DataType::Float64 => {
                let a = array.as_any().downcast_ref::<Float64Array>().ok_or_else(mismatch)?;
                Ok(Column::Float64(a.iter().collect()))
            }
            DataType::Date32 => {
                let a = array.as_any().downcast_ref::<Date32Array>().ok_or_else(mismatch)?;
                Ok(Column::Date(a.iter().map(|d| d.map(days_to_date)).collect()))
            }
            other => Err(StoreError::Schema(format!(
                "column {} has unsupported type {}",
                name, other
            ))),
        }
    }

    fn extend(&mut self, other: Column) -> Result<(), StoreError> {
        match (self, other) {
            (Column::Utf8(a), Column::Utf8(b)) => a.extend(b),
            (Column::Int64(a), Column::Int64(b)) => a.extend(b),
            (Column::Float64(a), Column::Float64(b)) => a.extend(b),
            (Column::Date(a), Column::Date(b)) => a.extend(b),
            _ => return Err(StoreError::Schema("column type changed between batches".into())),
        }
        Ok(())
    }
}

/// A named, ordered set of equally long columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatTable {
    pub name: TableName,
    pub columns: Vec<(String, Column)>,
}

impl FlatTable {
    pub fn new(name: TableName) -> Self {
        FlatTable {
            name,
            columns: Vec::new(),
        }
    }

    /// Append a column (builder style).
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.push((name.into(), column));
        self
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Arrow schema with every field nullable.
    pub fn schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|(name, col)| Field::new(name, col.data_type(), true))
                .collect::<Vec<_>>(),
        )
    }

    /// Convert into a single record batch.
    pub fn to_record_batch(&self) -> Result<RecordBatch, StoreError> {
        if self.columns.is_empty() {
            return Err(StoreError::EmptyTable(self.name.to_string()));
        }
        let rows = self.num_rows();
        if let Some((name, _)) = self.columns.iter().find(|(_, c)| c.len() != rows) {
            return Err(StoreError::Schema(format!(
                "column {} length differs from {} rows",
                name, rows
            )));
        }
        let arrays = self.columns.iter().map(|(_, c)| c.to_array()).collect();
        Ok(RecordBatch::try_new(Arc::new(self.schema()), arrays)?)
    }

    /// Rebuild a table from record batches sharing one schema.
    pub fn from_record_batches(
        name: TableName,
        schema: &Schema,
        batches: &[RecordBatch],
    ) -> Result<Self, StoreError> {
        let mut columns: Vec<(String, Column)> = schema
            .fields()
            .iter()
            .map(|f| {
                let empty = match f.data_type() {
                    DataType::Utf8 => Column::Utf8(Vec::new()),
                    DataType::Int64 => Column::Int64(Vec::new()),
                    DataType::Float64 => Column::Float64(Vec::new()),
                    DataType::Date32 => Column::Date(Vec::new()),
                    other => {
                        return Err(StoreError::Schema(format!(
                            "column {} has unsupported type {}",
                            f.name(),
                            other
                        )))
                    }
                };
                Ok((f.name().clone(), empty))
            })
            .collect::<Result<_, StoreError>>()?;

        for batch in batches {
            for (idx, (col_name, column)) in columns.iter_mut().enumerate() {
                let part = Column::from_array(col_name, batch.column(idx).as_ref())?;
                column.extend(part)?;
            }
        }

        Ok(FlatTable { name, columns })
    }

    /// Render as an ASCII table for markdown/summary output.
    pub fn pretty(&self) -> Result<String, StoreError> {
        let batch = self.to_record_batch()?;
        Ok(pretty_format_batches(&[batch])?.to_string())
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn date_to_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

fn days_to_date(days: i32) -> NaiveDate {
    epoch() + Duration::days(i64::from(days))
}
