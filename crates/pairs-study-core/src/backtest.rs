use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PairsError;
use crate::signal::{Side, SignalSeries};
use crate::spread::SpreadModel;
use crate::stats;
use crate::PairsResult;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// One date of the position/side table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRow {
    pub date: NaiveDate,
    /// Z-score of the spread
    pub signal: f64,
    /// Notional value of the position: the spread itself
    pub position: f64,
    pub side: Side,
    /// `pct_change(position) * side`
    pub daily_return: f64,
    /// Running sum of daily returns
    pub cumulative_return: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub observations: usize,
    /// Final cumulative (additive) return
    pub total_return: f64,
    /// Annualised Sharpe ratio of daily returns; 0 when returns do not vary
    pub sharpe_ratio: f64,
    /// Largest fall of the cumulative return from an earlier peak
    pub max_drawdown: f64,
    pub days_long: usize,
    pub days_short: usize,
    pub days_flat: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backtest {
    pub rows: Vec<PositionRow>,
    pub summary: BacktestSummary,
}

/// Evaluate the signal against the spread position.
///
/// Each date earns the percentage change of the spread since the previous
/// date, signed by that date's side. The first spread date has no previous
/// value and earns nothing. No costs, slippage or sizing are modelled.
///
/// A long or short date whose previous spread value is exactly zero has no
/// defined percentage change and fails the run.
pub fn run_backtest(model: &SpreadModel, signals: &SignalSeries) -> PairsResult<Backtest> {
    if signals.offset + signals.len() != model.len() {
        return Err(PairsError::InvalidInput {
            field: "signals".into(),
            reason: format!(
                "Signal series ({} values after offset {}) does not cover the spread ({} values)",
                signals.len(),
                signals.offset,
                model.len()
            ),
        });
    }

    let mut rows = Vec::with_capacity(signals.len());
    let mut cumulative = 0.0;

    for (k, (&signal, &side)) in signals.values.iter().zip(&signals.sides).enumerate() {
        let t = signals.offset + k;
        let position = model.spread[t];
        let daily_return = match side {
            Side::Flat => 0.0,
            Side::Long | Side::Short if t == 0 => 0.0,
            Side::Long | Side::Short => {
                let previous = model.spread[t - 1];
                if previous == 0.0 {
                    return Err(PairsError::DivisionByZero {
                        context: format!("spread percentage change on {}", model.dates[t]),
                    });
                }
                (position - previous) / previous * f64::from(side.sign())
            }
        };
        cumulative += daily_return;
        rows.push(PositionRow {
            date: model.dates[t],
            signal,
            position,
            side,
            daily_return,
            cumulative_return: cumulative,
        });
    }

    let summary = summarise(&rows);
    info!(
        pair = %model.pair,
        total_return = summary.total_return,
        sharpe = summary.sharpe_ratio,
        "backtest complete"
    );

    Ok(Backtest { rows, summary })
}

fn summarise(rows: &[PositionRow]) -> BacktestSummary {
    let returns: Vec<f64> = rows.iter().map(|r| r.daily_return).collect();
    let count = |side: Side| rows.iter().filter(|r| r.side == side).count();

    BacktestSummary {
        observations: rows.len(),
        total_return: rows.last().map_or(0.0, |r| r.cumulative_return),
        sharpe_ratio: sharpe_ratio(&returns),
        max_drawdown: max_drawdown(&rows.iter().map(|r| r.cumulative_return).collect::<Vec<_>>()),
        days_long: count(Side::Long),
        days_short: count(Side::Short),
        days_flat: count(Side::Flat),
    }
}

/// Annualised Sharpe ratio: `mean / std * sqrt(252)`, zero risk-free rate.
fn sharpe_ratio(returns: &[f64]) -> f64 {
    let std = match stats::sample_std(returns) {
        Ok(s) if s > 0.0 => s,
        _ => return 0.0,
    };
    stats::mean(returns) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Largest peak-to-trough fall of an additive cumulative-return curve,
/// measured from the starting level of zero.
fn max_drawdown(cumulative: &[f64]) -> f64 {
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for c in cumulative {
        peak = peak.max(*c);
        worst = worst.max(peak - c);
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::ZScoreMode;
    use crate::spread::{HedgeMode, SpreadDiagnostics};
    use crate::types::SymbolPair;
    use chrono::Duration;

    fn model(spread: Vec<f64>) -> SpreadModel {
        let start = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let n = spread.len();
        SpreadModel {
            pair: SymbolPair::new("A", "B"),
            mode: HedgeMode::Static,
            hedge_ratio: 1.0,
            intercept: 0.0,
            r_squared: 0.9,
            dates: (0..n).map(|i| start + Duration::days(i as i64)).collect(),
            hedge_ratios: vec![1.0; n],
            spread,
            diagnostics: SpreadDiagnostics {
                correlation: 0.9,
                spread_mean: 0.0,
                spread_std: 1.0,
                half_life: None,
                stationarity: None,
            },
        }
    }

    fn signals(model: &SpreadModel, values: Vec<f64>, sides: Vec<Side>) -> SignalSeries {
        SignalSeries {
            mode: ZScoreMode::FullSample,
            entry_threshold: 1.0,
            dates: model.dates.clone(),
            values,
            sides,
            offset: 0,
        }
    }

    #[test]
    fn test_returns_follow_side_and_pct_change() {
        let m = model(vec![10.0, 11.0, 9.9, 9.9, 12.375]);
        let s = signals(
            &m,
            vec![-1.5, -1.2, 0.0, 1.1, 1.3],
            vec![Side::Long, Side::Long, Side::Flat, Side::Short, Side::Short],
        );
        let bt = run_backtest(&m, &s).unwrap();
        let r: Vec<f64> = bt.rows.iter().map(|r| r.daily_return).collect();
        assert_eq!(r[0], 0.0);
        assert!((r[1] - 0.1).abs() < 1e-12);
        assert_eq!(r[2], 0.0);
        assert_eq!(r[3], 0.0);
        assert!((r[4] + 0.25).abs() < 1e-12);
        let last = bt.rows.last().unwrap();
        assert!((last.cumulative_return - (-0.15)).abs() < 1e-12);
        assert!((bt.summary.total_return - (-0.15)).abs() < 1e-12);
        assert_eq!(bt.summary.days_long, 2);
        assert_eq!(bt.summary.days_short, 2);
        assert_eq!(bt.summary.days_flat, 1);
    }

    #[test]
    fn test_cumulative_is_additive() {
        let m = model(vec![10.0, 11.0, 12.1, 13.31]);
        let s = signals(&m, vec![-2.0; 4], vec![Side::Long; 4]);
        let bt = run_backtest(&m, &s).unwrap();
        // three 10% moves sum to 0.3, not the compounded 0.331
        assert!((bt.summary.total_return - 0.3).abs() < 1e-12);
        assert_eq!(bt.summary.max_drawdown, 0.0);
    }

    #[test]
    fn test_zero_previous_position_is_an_error() {
        let m = model(vec![1.0, 0.0, 2.0]);
        let s = signals(&m, vec![0.0, 0.0, 1.5], vec![Side::Flat, Side::Flat, Side::Short]);
        assert!(matches!(
            run_backtest(&m, &s),
            Err(PairsError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_flat_after_zero_position_is_fine() {
        let m = model(vec![1.0, 0.0, 2.0]);
        let s = signals(&m, vec![0.0; 3], vec![Side::Flat; 3]);
        let bt = run_backtest(&m, &s).unwrap();
        assert_eq!(bt.summary.total_return, 0.0);
        assert_eq!(bt.summary.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_misaligned_signals_rejected() {
        let m = model(vec![1.0, 2.0, 3.0]);
        let mut s = signals(&m, vec![0.0; 3], vec![Side::Flat; 3]);
        s.offset = 1;
        assert!(run_backtest(&m, &s).is_err());
    }

    #[test]
    fn test_max_drawdown_from_peak() {
        assert_eq!(max_drawdown(&[0.1, 0.3, 0.05, 0.2]), 0.25);
        assert_eq!(max_drawdown(&[-0.1, -0.2]), 0.2);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn test_sharpe_ratio_sign() {
        let up = [0.01, 0.02, 0.015, 0.005];
        assert!(sharpe_ratio(&up) > 0.0);
        assert_eq!(sharpe_ratio(&[0.01]), 0.0);
    }
}
