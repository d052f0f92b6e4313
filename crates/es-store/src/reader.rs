//! Parquet reader for pipeline tables.

use std::fs::File;
use std::path::Path;

use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::schema::{FlatTable, TableName};
use crate::writer::StoreError;

/// Read a Parquet file written by [`crate::write_table`].
pub fn read_table(path: &Path, name: TableName) -> Result<FlatTable, StoreError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    FlatTable::from_record_batches(name, &schema, &batches)
}
