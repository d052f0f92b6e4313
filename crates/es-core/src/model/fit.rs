//! Coefficient estimation for one series.
//!
//! Loss minimization is an exhaustive search over boundary months present
//! in the series with `c0` set to the mean of the plateau region. Quantile
//! estimation reads `c0` off the completeness distribution and takes the
//! first month reaching it as the onset.

use chrono::NaiveDate;
use es_config::{CurveShape, FitStrategy, ModelConfig};
use es_math::{mean, quantile, Loss};

use super::shape::Coefficients;

/// Fit one series. `xs` is in ascending month order and aligned with `ys`.
pub fn fit_series(config: &ModelConfig, xs: &[NaiveDate], ys: &[f64]) -> Coefficients {
    debug_assert_eq!(xs.len(), ys.len());
    match (config.strategy, config.shape) {
        (FitStrategy::LossMinimization, CurveShape::Step) => {
            step_loss_minimization(config.loss, xs, ys)
        }
        (FitStrategy::LossMinimization, CurveShape::Rectangle) => {
            rectangle_loss_minimization(config.loss, config.min_rect_month_width, xs, ys)
        }
        (FitStrategy::Quantile, _) => step_quantile(config.quantile, xs, ys),
    }
}

/// Mean loss of `ys` against a plateau `c0` over `ys[on]` and 0 elsewhere.
fn plateau_loss(loss: Loss, ys: &[f64], on: std::ops::Range<usize>, c0: f64) -> f64 {
    loss.mean(ys.iter().enumerate().map(|(k, &y)| {
        if on.contains(&k) {
            y - c0
        } else {
            y
        }
    }))
    .unwrap_or(f64::INFINITY)
}

pub fn step_loss_minimization(loss: Loss, xs: &[NaiveDate], ys: &[f64]) -> Coefficients {
    let n = ys.len();
    let mut best: Option<(f64, usize, f64)> = None;
    for i in 0..n {
        let c0 = mean(&ys[i..]).unwrap_or(0.0);
        let value = plateau_loss(loss, ys, i..n, c0);
        if best.is_none_or(|(b, _, _)| value < b) {
            best = Some((value, i, c0));
        }
    }
    match best {
        Some((_, i, c0)) => Coefficients {
            t0: Some(xs[i]),
            c0,
            t1: None,
        },
        None => Coefficients {
            t0: None,
            c0: 0.0,
            t1: None,
        },
    }
}

pub fn rectangle_loss_minimization(
    loss: Loss,
    min_width: usize,
    xs: &[NaiveDate],
    ys: &[f64],
) -> Coefficients {
    let n = ys.len();
    let min_width = min_width.max(1);
    if n == 0 {
        return Coefficients {
            t0: None,
            c0: 0.0,
            t1: None,
        };
    }
    if n < min_width {
        return Coefficients {
            t0: Some(xs[0]),
            c0: mean(ys).unwrap_or(0.0),
            t1: Some(xs[n - 1]),
        };
    }

    let mut best: Option<(f64, usize, usize, f64)> = None;
    for i in 0..n {
        for j in (i + min_width)..=n {
            let c0 = mean(&ys[i..j]).unwrap_or(0.0);
            let value = plateau_loss(loss, ys, i..j, c0);
            if best.is_none_or(|(b, ..)| value < b) {
                best = Some((value, i, j, c0));
            }
        }
    }
    match best {
        Some((_, i, j, c0)) => Coefficients {
            t0: Some(xs[i]),
            c0,
            t1: Some(xs[j - 1]),
        },
        None => Coefficients {
            t0: Some(xs[0]),
            c0: mean(ys).unwrap_or(0.0),
            t1: Some(xs[n - 1]),
        },
    }
}

pub fn step_quantile(q: f64, xs: &[NaiveDate], ys: &[f64]) -> Coefficients {
    let c0 = quantile(ys, q).unwrap_or(0.0);
    let t0 = xs
        .iter()
        .zip(ys)
        .find(|&(_, &y)| y >= c0)
        .map(|(&x, _)| x);
    Coefficients { t0, c0, t1: None }
}
