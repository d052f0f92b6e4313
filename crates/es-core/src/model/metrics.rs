//! Error metrics of a fitted curve against its series.

use chrono::NaiveDate;
use es_common::month::months_between;
use es_config::{CurveShape, MetricName};
use es_math::Loss;

use super::shape::{Coefficients, ShapeFunction};

/// Mean loss over the metric's region, `None` when the region spans no
/// month or its bounds are unknown.
///
/// The region runs from the first observed month (`Error`) or `t0` to the
/// last observed month, or from `t0` to `t1` for `ErrorBetweenT0T1`. A
/// boundary at the last month, or a single-point series, leaves nothing
/// to average over.
pub fn compute_metric(
    metric: MetricName,
    shape: CurveShape,
    loss: Loss,
    coefficients: &Coefficients,
    xs: &[NaiveDate],
    ys: &[f64],
) -> Option<f64> {
    let first = xs.iter().min().copied()?;
    let last = xs.iter().max().copied()?;
    let (start, end) = match metric {
        MetricName::Error => (first, last),
        MetricName::ErrorAfterT0 => (coefficients.t0?, last),
        MetricName::ErrorBetweenT0T1 => (coefficients.t0?, coefficients.t1?),
    };
    if months_between(start, end) <= 0 {
        return None;
    }

    loss.mean(
        xs.iter()
            .zip(ys)
            .filter(|&(&x, _)| start <= x && x <= end)
            .map(|(&x, &y)| y - shape.value_at(coefficients, x)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, month, 1).unwrap()
    }

    #[test]
    fn test_error_after_t0_restricts_region() {
        let xs = vec![m(1), m(2), m(3), m(4)];
        let ys = vec![0.5, 0.0, 1.0, 0.8];
        let coef = Coefficients { t0: Some(m(3)), c0: 0.9, t1: None };
        let after = compute_metric(MetricName::ErrorAfterT0, CurveShape::Step, Loss::L2, &coef, &xs, &ys).unwrap();
        assert!((after - 0.01).abs() < 1e-12);
        let all = compute_metric(MetricName::Error, CurveShape::Step, Loss::L2, &coef, &xs, &ys).unwrap();
        assert!((all - (0.25 + 0.01 + 0.01) / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_region_is_missing() {
        let xs = vec![m(1), m(2)];
        let ys = vec![0.0, 0.0];
        let coef = Coefficients { t0: Some(m(5)), c0: 0.9, t1: None };
        assert_eq!(
            compute_metric(MetricName::ErrorAfterT0, CurveShape::Step, Loss::L2, &coef, &xs, &ys),
            None
        );
        let coef = Coefficients { t0: None, c0: 0.9, t1: None };
        assert_eq!(
            compute_metric(MetricName::ErrorAfterT0, CurveShape::Step, Loss::L2, &coef, &xs, &ys),
            None
        );
    }

    #[test]
    fn test_between_needs_t1() {
        let xs = vec![m(1), m(2), m(3)];
        let ys = vec![0.0, 0.5, 0.0];
        let coef = Coefficients { t0: Some(m(2)), c0: 0.5, t1: Some(m(3)) };
        assert_eq!(
            compute_metric(MetricName::ErrorBetweenT0T1, CurveShape::Rectangle, Loss::L1, &coef, &xs, &ys),
            Some(0.25)
        );
        let step = Coefficients { t1: None, ..coef };
        assert_eq!(
            compute_metric(MetricName::ErrorBetweenT0T1, CurveShape::Step, Loss::L1, &step, &xs, &ys),
            None
        );
    }

    #[test]
    fn test_zero_length_region_is_missing() {
        // t0 on the last observed month.
        let xs = vec![m(1), m(2), m(3), m(4)];
        let ys = vec![0.0, 0.0, 0.0, 0.9];
        let coef = Coefficients { t0: Some(m(4)), c0: 0.9, t1: None };
        assert_eq!(
            compute_metric(MetricName::ErrorAfterT0, CurveShape::Step, Loss::L2, &coef, &xs, &ys),
            None
        );
        assert_eq!(
            compute_metric(MetricName::Error, CurveShape::Step, Loss::L2, &coef, &xs, &ys),
            Some(0.0)
        );

        // One-month rectangle.
        let rect = Coefficients { t1: Some(m(4)), ..coef };
        assert_eq!(
            compute_metric(MetricName::ErrorBetweenT0T1, CurveShape::Rectangle, Loss::L2, &rect, &xs, &ys),
            None
        );

        // Single-point series.
        let coef = Coefficients { t0: Some(m(1)), c0: 0.4, t1: None };
        for metric in [MetricName::Error, MetricName::ErrorAfterT0] {
            assert_eq!(
                compute_metric(metric, CurveShape::Step, Loss::L2, &coef, &[m(1)], &[0.4]),
                None
            );
        }
    }
}
