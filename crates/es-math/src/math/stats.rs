//! Descriptive statistics over completeness series.
//!
//! All functions return `None` on empty input instead of NaN so that
//! callers decide how an empty region is reported.

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Largest value.
pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Quantile with linear interpolation between closest ranks.
///
/// `q` is clamped to [0, 1]. Matches the default "linear" method of
/// common dataframe libraries: position `q * (n - 1)` in the sorted data.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(quantile_sorted(&sorted, q))
}

/// Quantile of already sorted, non-empty data.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Percentile (`p` in [0, 100]) with linear interpolation.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    quantile(values, p / 100.0)
}

/// Divide `numerator` by `denominator`, returning 0 when the denominator is 0.
///
/// This is the completeness convention: an undefined ratio is reported as
/// no data available rather than as a missing observation.
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert!(approx_eq(mean(&[1.0, 2.0, 3.0]).unwrap(), 2.0));
    }

    #[test]
    fn test_max() {
        assert_eq!(max(&[]), None);
        assert_eq!(max(&[3.0, 7.0, 1.0]), Some(7.0));
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let data = [0.0, 0.0, 0.5, 1.0, 1.0];
        assert!(approx_eq(quantile(&data, 0.5).unwrap(), 0.5));
        // pos = 0.8 * 4 = 3.2 -> 1.0
        assert!(approx_eq(quantile(&data, 0.8).unwrap(), 1.0));
        // pos = 0.3 * 4 = 1.2 -> 0.0 + 0.5 * 0.2
        assert!(approx_eq(quantile(&data, 0.3).unwrap(), 0.1));
    }

    #[test]
    fn test_quantile_unsorted_input() {
        let data = [4.0, 1.0, 3.0, 2.0];
        assert!(approx_eq(quantile(&data, 0.0).unwrap(), 1.0));
        assert!(approx_eq(quantile(&data, 1.0).unwrap(), 4.0));
        assert!(approx_eq(quantile(&data, 0.5).unwrap(), 2.5));
    }

    #[test]
    fn test_quantile_single_and_empty() {
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&[0.3], 0.9), Some(0.3));
    }

    #[test]
    fn test_percentile_99() {
        let data: Vec<f64> = (0..=100).map(|v| v as f64).collect();
        assert!(approx_eq(percentile(&data, 99.0).unwrap(), 99.0));
    }

    #[test]
    fn test_ratio_or_zero() {
        assert_eq!(ratio_or_zero(3.0, 0.0), 0.0);
        assert_eq!(ratio_or_zero(0.0, 0.0), 0.0);
        assert!(approx_eq(ratio_or_zero(1.0, 4.0), 0.25));
    }
}
