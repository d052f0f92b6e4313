//! Completeness pipeline storage.
//!
//! This crate provides:
//! - A flat columnar table type shared by predictors, estimates and predictions
//! - Conversion between flat tables and Arrow record batches
//! - Compressed Parquet writes with atomic rename, and the matching reader

pub mod reader;
pub mod schema;
pub mod writer;

pub use reader::read_table;
pub use schema::{Column, FlatTable, TableName};
pub use writer::{write_table, StoreError, WriterConfig};

/// Schema version for persisted tables.
pub const SCHEMA_VERSION: &str = "1.0.0";
