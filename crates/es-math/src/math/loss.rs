//! Pointwise loss functions for curve fitting and error metrics.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Scalar loss applied to a residual `observed - fitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Loss {
    /// Squared residual.
    #[default]
    L2,
    /// Absolute residual.
    L1,
}

impl Loss {
    #[inline]
    pub fn apply(&self, residual: f64) -> f64 {
        match self {
            Loss::L2 => residual * residual,
            Loss::L1 => residual.abs(),
        }
    }

    /// Mean loss of the residuals; `None` for an empty slice.
    pub fn mean(&self, residuals: impl IntoIterator<Item = f64>) -> Option<f64> {
        let mut total = 0.0;
        let mut count = 0usize;
        for r in residuals {
            total += self.apply(r);
            count += 1;
        }
        if count == 0 {
            None
        } else {
            Some(total / count as f64)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Loss::L2 => "l2",
            Loss::L1 => "l1",
        }
    }
}

impl std::fmt::Display for Loss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Loss {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "l2" | "l2_loss" | "squared" => Ok(Loss::L2),
            "l1" | "l1_loss" | "absolute" => Ok(Loss::L1),
            _ => Err(format!("unknown loss: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply() {
        assert_eq!(Loss::L2.apply(-0.5), 0.25);
        assert_eq!(Loss::L1.apply(-0.5), 0.5);
    }

    #[test]
    fn test_mean_empty_is_none() {
        assert_eq!(Loss::L2.mean(std::iter::empty()), None);
        assert_eq!(Loss::L1.mean([1.0, -3.0]), Some(2.0));
    }

    #[test]
    fn test_parse() {
        assert_eq!("l2_loss".parse::<Loss>().unwrap(), Loss::L2);
        assert_eq!("L1".parse::<Loss>().unwrap(), Loss::L1);
        assert!("huber".parse::<Loss>().is_err());
    }
}
