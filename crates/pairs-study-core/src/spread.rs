use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PairsError;
use crate::stats::adf::{self, Trend};
use crate::stats::{self, mackinnon, ols};
use crate::types::{PriceTable, SymbolPair};
use crate::PairsResult;

/// How the hedge ratio is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HedgeMode {
    /// One full-sample OLS slope for every date.
    #[default]
    Static,
    /// Trailing-window OLS slope re-estimated each date. Dates before the
    /// first full window have no spread and are dropped.
    Rolling { window: usize },
}

/// Stationarity check of the spread itself (ADF with a constant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadStationarity {
    pub adf_statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadDiagnostics {
    /// Pearson correlation of the two price series
    pub correlation: f64,
    pub spread_mean: f64,
    /// Population standard deviation of the spread
    pub spread_std: f64,
    /// AR(1) mean-reversion half-life in trading days
    pub half_life: Option<f64>,
    pub stationarity: Option<SpreadStationarity>,
}

/// Spread of `second - hedge_ratio * first` for a chosen pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadModel {
    pub pair: SymbolPair,
    pub mode: HedgeMode,
    /// Full-sample OLS slope of `second` on `first`
    pub hedge_ratio: f64,
    /// Full-sample OLS intercept; not part of the spread
    pub intercept: f64,
    pub r_squared: f64,
    pub dates: Vec<NaiveDate>,
    /// Hedge ratio applied on each date
    pub hedge_ratios: Vec<f64>,
    pub spread: Vec<f64>,
    pub diagnostics: SpreadDiagnostics,
}

impl SpreadModel {
    pub fn len(&self) -> usize {
        self.spread.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spread.is_empty()
    }

    /// Index into the price table of the first date carried by the spread.
    pub fn offset(&self, prices: &PriceTable) -> usize {
        prices.len() - self.spread.len()
    }
}

/// OLS slope of `b` on `a` with an intercept.
pub fn hedge_ratio(a: &[f64], b: &[f64]) -> PairsResult<f64> {
    Ok(ols::simple_ols(b, a)?.slope)
}

/// `b - ratio * a`, element-wise.
pub fn spread_series(a: &[f64], b: &[f64], ratio: f64) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| y - ratio * x).collect()
}

/// Trailing-window hedge ratios. Entry `t` uses observations
/// `t + 1 - window ..= t`; earlier entries are `None`.
pub fn rolling_hedge_ratio(a: &[f64], b: &[f64], window: usize) -> PairsResult<Vec<Option<f64>>> {
    if a.len() != b.len() {
        return Err(PairsError::InvalidInput {
            field: "b".into(),
            reason: format!("Series lengths differ: {} vs {}", a.len(), b.len()),
        });
    }
    if window < 2 || window > a.len() {
        return Err(PairsError::InvalidInput {
            field: "window".into(),
            reason: format!(
                "Rolling window must be between 2 and {} observations, got {}",
                a.len(),
                window
            ),
        });
    }

    let mut out = vec![None; window - 1];
    for end in window..=a.len() {
        let start = end - window;
        out.push(Some(hedge_ratio(&a[start..end], &b[start..end])?));
    }
    Ok(out)
}

/// Fit the hedge ratio for `pair` and derive its spread.
///
/// The regression is `second = intercept + hedge_ratio * first`; the spread
/// deliberately omits the intercept, which shifts its level but not its
/// mean-reversion shape.
pub fn model_spread(
    prices: &PriceTable,
    pair: &SymbolPair,
    mode: HedgeMode,
) -> PairsResult<SpreadModel> {
    let a = prices.values_of(&pair.first)?;
    let b = prices.values_of(&pair.second)?;
    let fit = ols::simple_ols(b, a)?;

    let (dates, hedge_ratios, spread) = match mode {
        HedgeMode::Static => (
            prices.dates().to_vec(),
            vec![fit.slope; a.len()],
            spread_series(a, b, fit.slope),
        ),
        HedgeMode::Rolling { window } => {
            let ratios = rolling_hedge_ratio(a, b, window)?;
            let mut dates = Vec::with_capacity(ratios.len());
            let mut applied = Vec::with_capacity(ratios.len());
            let mut spread = Vec::with_capacity(ratios.len());
            for (t, ratio) in ratios.into_iter().enumerate() {
                if let Some(r) = ratio {
                    dates.push(prices.dates()[t]);
                    applied.push(r);
                    spread.push(b[t] - r * a[t]);
                }
            }
            (dates, applied, spread)
        }
    };

    let stationarity = match adf::adf_regression(&spread, Trend::Constant, None) {
        Ok(res) => Some(SpreadStationarity {
            p_value: mackinnon::p_value(res.statistic, 1)?,
            adf_statistic: res.statistic,
            used_lag: res.used_lag,
        }),
        Err(e) => {
            debug!(pair = %pair, error = %e, "spread stationarity check skipped");
            None
        }
    };

    let diagnostics = SpreadDiagnostics {
        correlation: stats::pearson_correlation(a, b)?,
        spread_mean: stats::mean(&spread),
        spread_std: stats::population_std(&spread)?,
        half_life: stats::half_life(&spread),
        stationarity,
    };

    info!(
        pair = %pair,
        hedge_ratio = fit.slope,
        observations = spread.len(),
        "spread modelled"
    );

    Ok(SpreadModel {
        pair: pair.clone(),
        mode,
        hedge_ratio: fit.slope,
        intercept: fit.intercept,
        r_squared: fit.r_squared,
        dates,
        hedge_ratios,
        spread,
        diagnostics,
    })
}
