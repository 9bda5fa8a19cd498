use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PairsError;
use crate::spread::SpreadModel;
use crate::stats;
use crate::PairsResult;

/// Entry threshold used when none is configured, in standard deviations.
pub const DEFAULT_ENTRY_THRESHOLD: f64 = 1.0;

/// How the spread is normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ZScoreMode {
    /// Mean and standard deviation of the whole sample. Every date sees
    /// statistics computed from later dates (look-ahead).
    #[default]
    FullSample,
    /// Trailing window ending at each date; causal. Warm-up dates are dropped.
    Rolling { window: usize },
}

impl ZScoreMode {
    pub fn is_causal(&self) -> bool {
        matches!(self, ZScoreMode::Rolling { .. })
    }
}

/// Position side implied by the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Long the spread (+1)
    Long,
    Flat,
    /// Short the spread (-1)
    Short,
}

impl Side {
    /// Classify a z-score against a symmetric entry threshold.
    pub fn from_signal(signal: f64, entry: f64) -> Self {
        if signal <= -entry {
            Side::Long
        } else if signal >= entry {
            Side::Short
        } else {
            Side::Flat
        }
    }

    pub fn sign(self) -> i8 {
        match self {
            Side::Long => 1,
            Side::Flat => 0,
            Side::Short => -1,
        }
    }
}

/// A series is degenerate only when every value is equal. The summed mean of
/// such a series can pick up rounding error, so the check is on the values.
fn has_no_spread(values: &[f64], std: f64) -> bool {
    std == 0.0 || values.windows(2).all(|w| w[0] == w[1])
}

/// Full-sample z-score using the population standard deviation.
///
/// A constant series has no defined z-score and is rejected.
pub fn zscore(values: &[f64]) -> PairsResult<Vec<f64>> {
    let mean = stats::mean(values);
    let std = stats::population_std(values)?;
    if has_no_spread(values, std) {
        return Err(PairsError::DivisionByZero {
            context: "z-score: series has zero standard deviation".into(),
        });
    }
    Ok(values.iter().map(|v| (v - mean) / std).collect())
}

/// Trailing-window z-score. Entry `t` uses `t + 1 - window ..= t`; the first
/// `window - 1` entries are `None`.
pub fn rolling_zscore(values: &[f64], window: usize) -> PairsResult<Vec<Option<f64>>> {
    if window < 2 || window > values.len() {
        return Err(PairsError::InvalidInput {
            field: "window".into(),
            reason: format!(
                "Rolling window must be between 2 and {} observations, got {}",
                values.len(),
                window
            ),
        });
    }

    let mut out = vec![None; window - 1];
    for end in window..=values.len() {
        let slice = &values[end - window..end];
        let mean = stats::mean(slice);
        let std = stats::population_std(slice)?;
        if has_no_spread(slice, std) {
            return Err(PairsError::DivisionByZero {
                context: format!("rolling z-score: flat window ending at index {}", end - 1),
            });
        }
        out.push(Some((values[end - 1] - mean) / std));
    }
    Ok(out)
}

/// Normalised spread and the side it implies on each date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSeries {
    pub mode: ZScoreMode,
    pub entry_threshold: f64,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub sides: Vec<Side>,
    /// Spread entries skipped before the first signal
    pub offset: usize,
}

impl SignalSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Normalise the spread and classify each date as long, short or flat.
///
/// `entry_threshold` must be positive so the long and short zones never
/// overlap.
pub fn generate_signals(
    model: &SpreadModel,
    mode: ZScoreMode,
    entry_threshold: f64,
) -> PairsResult<SignalSeries> {
    if !(entry_threshold > 0.0 && entry_threshold.is_finite()) {
        return Err(PairsError::InvalidInput {
            field: "entry_threshold".into(),
            reason: format!("Entry threshold must be positive, got {entry_threshold}"),
        });
    }

    let (offset, values) = match mode {
        ZScoreMode::FullSample => (0, zscore(&model.spread)?),
        ZScoreMode::Rolling { window } => {
            let rolled = rolling_zscore(&model.spread, window)?;
            (window - 1, rolled.into_iter().flatten().collect())
        }
    };

    let dates = model.dates[offset..].to_vec();
    let sides: Vec<Side> = values
        .iter()
        .map(|z| Side::from_signal(*z, entry_threshold))
        .collect();

    info!(
        pair = %model.pair,
        observations = values.len(),
        long = sides.iter().filter(|s| **s == Side::Long).count(),
        short = sides.iter().filter(|s| **s == Side::Short).count(),
        "signals generated"
    );

    Ok(SignalSeries {
        mode,
        entry_threshold,
        dates,
        values,
        sides,
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zscore_mean_zero_unit_variance() {
        let z = zscore(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let mean = stats::mean(&z);
        let std = stats::population_std(&z).unwrap();
        assert!(mean.abs() < 1e-12);
        assert!((std - 1.0).abs() < 1e-12);
        // population std of 1..5 is sqrt(2)
        assert!((z[0] + 2.0 / 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_zscore_constant_series_is_an_error() {
        assert!(matches!(
            zscore(&[0.1; 25]),
            Err(PairsError::DivisionByZero { .. })
        ));
        assert!(matches!(
            zscore(&[7.0; 3]),
            Err(PairsError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_zscore_tiny_scale_is_defined() {
        let z = zscore(&[1e-17, 2e-17, 3e-17]).unwrap();
        assert!((z[1]).abs() < 1e-9);
        assert!((z[2] - 1.5_f64.sqrt()).abs() < 1e-9);
        assert!((z[0] + z[2]).abs() < 1e-9);

        let rolled = rolling_zscore(&[5e-18, 1e-17, 2e-17, 3e-17], 3).unwrap();
        assert!(rolled[3].is_some());
    }

    #[test]
    fn test_zscore_empty_is_an_error() {
        assert!(zscore(&[]).is_err());
    }

    #[test]
    fn test_side_three_way_branch() {
        assert_eq!(Side::from_signal(-1.0, 1.0), Side::Long);
        assert_eq!(Side::from_signal(-3.2, 1.0), Side::Long);
        assert_eq!(Side::from_signal(1.0, 1.0), Side::Short);
        assert_eq!(Side::from_signal(0.99, 1.0), Side::Flat);
        assert_eq!(Side::from_signal(-0.99, 1.0), Side::Flat);
        assert_eq!(Side::Long.sign(), 1);
        assert_eq!(Side::Short.sign(), -1);
        assert_eq!(Side::Flat.sign(), 0);
    }

    #[test]
    fn test_rolling_zscore_is_causal() {
        let values = [1.0, 2.0, 3.0, 4.0, 100.0];
        let z = rolling_zscore(&values, 3).unwrap();
        assert_eq!(z[0], None);
        assert_eq!(z[1], None);
        // window [1,2,3], last value 3: (3 - 2) / sqrt(2/3)
        assert!((z[2].unwrap() - 1.0 / (2.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        // the outlier at the end does not change earlier values
        let head = rolling_zscore(&values[..4], 3).unwrap();
        assert_eq!(head[3], z[3]);
    }

    #[test]
    fn test_rolling_zscore_flat_window_fails() {
        let values = [1.0, 1.0, 1.0, 2.0];
        assert!(rolling_zscore(&values, 3).is_err());
        assert!(rolling_zscore(&values, 1).is_err());
        assert!(rolling_zscore(&values, 5).is_err());
    }
}
