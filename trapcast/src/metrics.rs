//! Metrics for evaluating forecast performance

use crate::error::{ForecastError, Result};
use crate::models::Forecast;
use crate::normalize::CanonicalSeries;
use std::collections::HashMap;
use std::fmt;

/// Forecast accuracy metrics
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastAccuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error, over non-zero actuals
    pub mape: f64,
    /// Symmetric Mean Absolute Percentage Error
    pub smape: f64,
    /// Share of actuals inside the prediction interval, in percent
    pub coverage: Option<f64>,
    /// Number of compared points
    pub observations: usize,
}

impl fmt::Display for ForecastAccuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE {:.3} | RMSE {:.3} | MAPE {:.2}% | SMAPE {:.2}%",
            self.mae, self.rmse, self.mape, self.smape
        )?;
        if let Some(coverage) = self.coverage {
            write!(f, " | coverage {:.1}%", coverage)?;
        }
        write!(f, " (n = {})", self.observations)
    }
}

/// Calculate point forecast accuracy
pub fn forecast_accuracy(forecast: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::ValidationError(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = forecast.len() as f64;

    let errors: Vec<f64> = forecast
        .iter()
        .zip(actual.iter())
        .map(|(&f, &a)| a - f)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;
    let rmse = mse.sqrt();

    // Zero counts are common in trap data, so they are left out of the denominator too
    let nonzero: Vec<(f64, f64)> = actual
        .iter()
        .zip(errors.iter())
        .filter(|(&a, _)| a != 0.0)
        .map(|(&a, &e)| (a, e))
        .collect();
    let mape = if nonzero.is_empty() {
        0.0
    } else {
        nonzero
            .iter()
            .map(|(a, e)| (e.abs() / a.abs()) * 100.0)
            .sum::<f64>()
            / nonzero.len() as f64
    };

    let smape = actual
        .iter()
        .zip(forecast.iter())
        .map(|(&a, &f)| {
            let abs_a = a.abs();
            let abs_f = f.abs();
            if abs_a + abs_f == 0.0 {
                0.0
            } else {
                200.0 * (a - f).abs() / (abs_a + abs_f)
            }
        })
        .sum::<f64>()
        / n;

    Ok(ForecastAccuracy {
        mae,
        mse,
        rmse,
        mape,
        smape,
        coverage: None,
        observations: forecast.len(),
    })
}

/// Percentage of actual values falling within `[lower, upper]`
pub fn interval_coverage(lower: &[f64], upper: &[f64], actual: &[f64]) -> Result<f64> {
    if lower.len() != actual.len() || upper.len() != actual.len() || actual.is_empty() {
        return Err(ForecastError::ValidationError(
            "Interval bounds and actual values must have the same non-zero length".to_string(),
        ));
    }

    let inside = actual
        .iter()
        .zip(lower.iter().zip(upper.iter()))
        .filter(|(&a, (&lo, &hi))| a >= lo && a <= hi)
        .count();

    Ok(inside as f64 / actual.len() as f64 * 100.0)
}

/// Accuracy of the fitted values over the observed part of the history
///
/// Rows are matched by date; history rows without a count are skipped.
pub fn in_sample_accuracy(forecast: &Forecast, series: &CanonicalSeries) -> Result<ForecastAccuracy> {
    let position: HashMap<_, _> = forecast
        .dates()
        .iter()
        .enumerate()
        .map(|(i, date)| (*date, i))
        .collect();

    let mut predicted = Vec::new();
    let mut lower = Vec::new();
    let mut upper = Vec::new();
    let mut actual = Vec::new();
    for (date, value) in series.dates()?.into_iter().zip(series.values()?) {
        if let (Some(&i), Some(y)) = (position.get(&date), value) {
            predicted.push(forecast.yhat()[i]);
            lower.push(forecast.yhat_lower()[i]);
            upper.push(forecast.yhat_upper()[i]);
            actual.push(y);
        }
    }

    if actual.is_empty() {
        return Err(ForecastError::ValidationError(
            "Forecast shares no observed dates with the history".to_string(),
        ));
    }

    let mut accuracy = forecast_accuracy(&predicted, &actual)?;
    accuracy.coverage = Some(interval_coverage(&lower, &upper, &actual)?);
    Ok(accuracy)
}
