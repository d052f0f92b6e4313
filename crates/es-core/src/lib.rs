//! Completeness estimation core library.
//!
//! This library provides the pipeline behind the `edsteva` binary:
//! - Dataset loading and the care-site hierarchy index
//! - Probes aggregating records into monthly completeness series
//! - Curve-fitting models, metrics and threshold selection
//! - Exit codes, configuration loading and structured logging
//! - A seeded synthetic dataset generator
//!
//! The binary entry point is in `main.rs`.

pub mod artifact;
pub mod config;
pub mod data;
pub mod exit_codes;
pub mod hierarchy;
pub mod logging;
pub mod model;
pub mod probe;
pub mod select;
pub mod synthetic;

pub use data::Dataset;
pub use hierarchy::CareSiteHierarchy;
pub use model::{Estimates, FitOptions, Model, Predictions};
pub use probe::{Predictor, Probe, SeriesKey};
pub use select::select;
pub use synthetic::SyntheticConfig;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
