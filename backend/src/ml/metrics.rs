//! Regression metrics
//!
//! MAE, MSE and R² are smartcore's scorers; the percentage-based figures
//! reported alongside them are computed here.

use serde::{Deserialize, Serialize};
use smartcore::metrics::{mean_absolute_error, mean_squared_error, r2};

/// Mean absolute error
pub fn mae(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    mean_absolute_error(&y_true.to_vec(), &y_pred.to_vec())
}

/// Mean squared error
pub fn mse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    mean_squared_error(&y_true.to_vec(), &y_pred.to_vec())
}

pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mse(y_true, y_pred).sqrt()
}

/// Coefficient of determination.
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r_squared(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let Some(&first) = y_true.first() else {
        return 0.0;
    };
    if y_true.iter().all(|&t| t == first) {
        return if mae(y_true, y_pred) == 0.0 { 1.0 } else { 0.0 };
    }
    r2(&y_true.to_vec(), &y_pred.to_vec())
}

/// Mean absolute percentage error, as a fraction
pub fn mape(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mean(
        y_true
            .iter()
            .zip(y_pred)
            .map(|(t, p)| (t - p).abs() / t.abs().max(f64::EPSILON)),
    )
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Held-out evaluation of one fitted model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    /// Percent
    pub mape: f64,
    /// `max(0, 100 - mape)`
    pub accuracy: f64,
    pub max_error: f64,
    pub median_error: f64,
}

impl RegressionMetrics {
    pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Self {
        let mut errors: Vec<f64> = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).collect();
        errors.sort_by(f64::total_cmp);
        let median_error = match errors.len() {
            0 => 0.0,
            n if n % 2 == 1 => errors[n / 2],
            n => (errors[n / 2 - 1] + errors[n / 2]) / 2.0,
        };
        let mape_percent = mape(y_true, y_pred) * 100.0;

        Self {
            mae: mae(y_true, y_pred),
            rmse: rmse(y_true, y_pred),
            r2: r_squared(y_true, y_pred),
            mape: mape_percent,
            accuracy: (100.0 - mape_percent).max(0.0),
            max_error: errors.last().copied().unwrap_or(0.0),
            median_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_prediction() {
        let y = [1.0, 2.0, 3.0];
        let m = RegressionMetrics::evaluate(&y, &y);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.accuracy, 100.0);
    }

    #[test]
    fn test_known_values() {
        let y_true = [100.0, 200.0, 300.0, 400.0];
        let y_pred = [110.0, 190.0, 330.0, 400.0];
        assert_eq!(mae(&y_true, &y_pred), 12.5);
        assert_eq!(mse(&y_true, &y_pred), 275.0);
        assert!((r_squared(&y_true, &y_pred) - (1.0 - 1100.0 / 50000.0)).abs() < 1e-12);
        let m = RegressionMetrics::evaluate(&y_true, &y_pred);
        assert_eq!(m.max_error, 30.0);
        assert_eq!(m.median_error, 10.0);
    }

    #[test]
    fn test_constant_target_r2() {
        assert_eq!(r_squared(&[5.0, 5.0], &[5.0, 5.0]), 1.0);
        assert_eq!(r_squared(&[5.0, 5.0], &[4.0, 6.0]), 0.0);
    }
}
