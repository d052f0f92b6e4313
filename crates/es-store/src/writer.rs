//! Parquet writer for pipeline tables.
//!
//! Files are written next to their destination with a `.tmp` suffix and
//! renamed once the footer is flushed, so readers never see partial files.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, Encoding, ZstdLevel};
use parquet::file::properties::{WriterProperties, WriterVersion};
use thiserror::Error;
use tracing::debug;

use crate::schema::FlatTable;

/// Errors from storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Table {0} has no columns")]
    EmptyTable(String),
}

impl From<StoreError> for es_common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => es_common::Error::Io(e),
            other => es_common::Error::Storage(other.to_string()),
        }
    }
}

/// Configuration for Parquet writes.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Compression codec.
    pub compression: Compression,

    /// Maximum rows per row group; `None` uses the table default.
    pub row_group_size: Option<usize>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterConfig {
    /// Create config with defaults (zstd level 3).
    pub fn new() -> Self {
        let compression = ZstdLevel::try_new(3)
            .map(Compression::ZSTD)
            .unwrap_or(Compression::ZSTD(ZstdLevel::default()));
        WriterConfig {
            compression,
            row_group_size: None,
        }
    }

    /// Use snappy compression instead of zstd.
    pub fn with_snappy(mut self) -> Self {
        self.compression = Compression::SNAPPY;
        self
    }

    /// Set custom row group size.
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = Some(size);
        self
    }
}

/// Write a table to `path` as a single Parquet file.
pub fn write_table(
    path: &Path,
    table: &FlatTable,
    config: &WriterConfig,
) -> Result<PathBuf, StoreError> {
    let batch = table.to_record_batch()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);
    let file = File::create(&temp_path)?;

    let props = WriterProperties::builder()
        .set_writer_version(WriterVersion::PARQUET_2_0)
        .set_compression(config.compression)
        .set_max_row_group_size(
            config
                .row_group_size
                .unwrap_or_else(|| table.name.row_group_size()),
        )
        // Dictionary encoding for label columns
        .set_dictionary_enabled(true)
        .set_encoding(Encoding::PLAIN)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    atomic_rename(&temp_path, path)?;
    debug!(
        table = %table.name,
        rows = batch.num_rows(),
        path = %path.display(),
        "table written"
    );
    Ok(path.to_path_buf())
}

/// Helper to rename temp file to final path atomically.
pub fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<(), StoreError> {
    fs::rename(temp_path, final_path)?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
