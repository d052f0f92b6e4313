//! Core math modules.

pub mod loss;
pub mod stats;
