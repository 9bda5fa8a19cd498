//! Floating-point statistics shared by every stage of the study.
//!
//! - [`ols`]: least-squares fits (closed-form simple regression and a
//!   general design-matrix fit with standard errors and AIC)
//! - [`adf`]: augmented Dickey-Fuller regression with AIC lag selection
//! - [`mackinnon`]: approximate p-values and critical values for unit-root
//!   and cointegration statistics

pub mod adf;
pub mod mackinnon;
pub mod ols;

use crate::error::PairsError;
use crate::PairsResult;

/// Arithmetic mean. Zero for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by n).
pub fn population_std(values: &[f64]) -> PairsResult<f64> {
    if values.is_empty() {
        return Err(PairsError::InsufficientData(
            "Standard deviation of an empty series".into(),
        ));
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Ok(var.sqrt())
}

/// Sample standard deviation (divides by n - 1).
pub fn sample_std(values: &[f64]) -> PairsResult<f64> {
    if values.len() < 2 {
        return Err(PairsError::InsufficientData(format!(
            "Sample standard deviation needs at least 2 values, got {}",
            values.len()
        )));
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Ok(var.sqrt())
}

/// Pearson correlation coefficient between two equally long series.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> PairsResult<f64> {
    if x.len() != y.len() {
        return Err(PairsError::InvalidInput {
            field: "y".into(),
            reason: format!("Length {} does not match x length {}", y.len(), x.len()),
        });
    }
    let mean_x = mean(x);
    let mean_y = mean(y);

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = var_x.sqrt() * var_y.sqrt();
    if denom == 0.0 {
        return Err(PairsError::DivisionByZero {
            context: "Pearson correlation: zero variance".into(),
        });
    }
    Ok(cov / denom)
}

/// Mean-reversion half-life from an AR(1) fit `S_t = c + phi * S_{t-1} + e`.
///
/// `None` when `phi` is outside (0, 1), i.e. the series does not mean-revert.
pub fn half_life(series: &[f64]) -> Option<f64> {
    if series.len() < 3 {
        return None;
    }
    let lagged = &series[..series.len() - 1];
    let current = &series[1..];
    let fit = ols::simple_ols(current, lagged).ok()?;
    let phi = fit.slope;
    if phi <= 0.0 || phi >= 1.0 {
        return None;
    }
    Some(-(2.0_f64.ln()) / phi.ln())
}
