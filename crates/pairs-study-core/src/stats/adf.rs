use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::PairsError;
use crate::stats::ols;
use crate::PairsResult;

/// Deterministic terms included in the ADF regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// No constant; used on cointegration residuals, which are already demeaned.
    None,
    Constant,
}

impl Trend {
    fn n_terms(self) -> usize {
        match self {
            Trend::None => 0,
            Trend::Constant => 1,
        }
    }
}

/// Outcome of an augmented Dickey-Fuller regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdfRegression {
    /// t-statistic on the lagged level
    pub statistic: f64,
    /// Number of lagged differences selected by AIC
    pub used_lag: usize,
    /// Observations in the final regression
    pub nobs: usize,
}

/// Schwert's rule, `ceil(12 * (n / 100)^(1/4))`, capped so the largest
/// regression keeps positive degrees of freedom.
pub fn default_max_lag(nobs: usize, trend: Trend) -> PairsResult<usize> {
    let schwert = (12.0 * (nobs as f64 / 100.0).powf(0.25)).ceil() as usize;
    let cap = (nobs / 2).checked_sub(trend.n_terms() + 1).ok_or_else(|| {
        PairsError::InsufficientData(format!(
            "{nobs} observations are too few for an ADF regression"
        ))
    })?;
    Ok(schwert.min(cap))
}

/// Regress `Δx_t` on `x_{t-1}`, `lag` lagged differences and the trend terms,
/// dropping the first `trim` differences so competing lag lengths share a sample.
fn regress(
    series: &[f64],
    diffs: &[f64],
    lag: usize,
    trim: usize,
    trend: Trend,
) -> PairsResult<ols::OlsFit> {
    let rows = diffs.len() - trim;
    let cols = 1 + lag + trend.n_terms();
    let design = DMatrix::from_fn(rows, cols, |r, c| {
        let t = trim + r;
        if c == 0 {
            series[t]
        } else if c <= lag {
            diffs[t - c]
        } else {
            1.0
        }
    });
    let response = DVector::from_fn(rows, |r, _| diffs[trim + r]);
    ols::fit(&response, &design, "ADF regression")
}

/// Augmented Dickey-Fuller t-statistic with the lag length chosen by AIC.
///
/// All candidate lags `0..=max_lag` are compared on the common sample that
/// the longest lag allows; the winning lag is then refitted on every
/// observation it can use. Ties go to the shorter lag.
pub fn adf_regression(
    series: &[f64],
    trend: Trend,
    max_lag: Option<usize>,
) -> PairsResult<AdfRegression> {
    let nobs = series.len();
    let max_lag = match max_lag {
        Some(lag) => lag,
        None => default_max_lag(nobs, trend)?,
    };
    if nobs < max_lag + trend.n_terms() + 3 {
        return Err(PairsError::InsufficientData(format!(
            "ADF with {max_lag} lags needs more than {nobs} observations"
        )));
    }

    let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=max_lag {
        let aic = match regress(series, &diffs, lag, max_lag, trend) {
            Ok(fit) => fit.aic(),
            Err(PairsError::InsufficientData(_)) => continue,
            Err(e) => return Err(e),
        };
        if best.map_or(true, |(b, _)| aic < b) {
            best = Some((aic, lag));
        }
    }
    let (_, used_lag) = best.ok_or_else(|| {
        PairsError::InsufficientData("No ADF lag length could be fitted".into())
    })?;

    let fit = regress(series, &diffs, used_lag, used_lag, trend)?;
    if fit.std_errors[0] == 0.0 || !fit.std_errors[0].is_finite() {
        return Err(PairsError::DivisionByZero {
            context: "ADF t-statistic: zero residual variance".into(),
        });
    }

    Ok(AdfRegression {
        statistic: fit.t_value(0),
        used_lag,
        nobs: fit.nobs,
    })
}
