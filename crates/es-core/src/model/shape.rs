//! Curve shapes and their coefficients.

use chrono::NaiveDate;
use es_config::CurveShape;
use serde::{Deserialize, Serialize};

/// Fitted coefficients of one series.
///
/// `t1` is only set for rectangles. A step whose `t0` is unknown never
/// switches on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub t0: Option<NaiveDate>,
    pub c0: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t1: Option<NaiveDate>,
}

/// Evaluation of a curve shape.
pub trait ShapeFunction {
    fn value_at(&self, coefficients: &Coefficients, t: NaiveDate) -> f64;

    fn coefficient_names(&self) -> &'static [&'static str];

    /// True when `t` lies where the indicator is 1.
    fn is_on(&self, coefficients: &Coefficients, t: NaiveDate) -> bool;
}

impl ShapeFunction for CurveShape {
    fn value_at(&self, coefficients: &Coefficients, t: NaiveDate) -> f64 {
        if self.is_on(coefficients, t) {
            coefficients.c0
        } else {
            0.0
        }
    }

    fn coefficient_names(&self) -> &'static [&'static str] {
        match self {
            CurveShape::Step => &["t0", "c0"],
            CurveShape::Rectangle => &["t0", "c0", "t1"],
        }
    }

    fn is_on(&self, coefficients: &Coefficients, t: NaiveDate) -> bool {
        let Some(t0) = coefficients.t0 else {
            return false;
        };
        match self {
            CurveShape::Step => t >= t0,
            CurveShape::Rectangle => t >= t0 && coefficients.t1.is_none_or(|t1| t <= t1),
        }
    }
}
