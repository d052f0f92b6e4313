//! Numeric kernels for completeness estimation.

pub mod math;

pub use math::loss::Loss;
pub use math::stats::*;
