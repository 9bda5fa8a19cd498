use serde::{Deserialize, Serialize};

use crate::error::PairsError;
use crate::stats::adf::{self, Trend};
use crate::stats::mackinnon::{self, CriticalValues};
use crate::stats::ols;
use crate::PairsResult;

/// Minimum aligned observations for a cointegration test.
pub const MIN_OBSERVATIONS: usize = 20;

/// Largest unexplained share of variance (`1 - R²`) still treated as an
/// exact linear relation. Anything above it carries residual noise and gets
/// a real ADF test, however small that noise is.
const COLLINEAR_TOLERANCE: f64 = f64::EPSILON;

/// Result of an Engle-Granger two-step cointegration test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CointegrationTest {
    /// ADF t-statistic of the cointegrating-regression residuals
    pub statistic: f64,
    /// MacKinnon approximate p-value (two series, constant)
    pub p_value: f64,
    /// Finite-sample critical values at 1/5/10 %
    pub critical_values: CriticalValues,
    /// Slope of the cointegrating regression `y0 = c + slope * y1`
    pub slope: f64,
    /// Lagged differences chosen for the residual ADF regression
    pub used_lag: usize,
    /// Aligned observations in the two series
    pub nobs: usize,
    /// The series are an exact linear function of each other: the residuals
    /// are rounding error, and the result is reported as "no evidence" (p = 1).
    pub collinear: bool,
}

/// Engle-Granger test of `y0` against `y1`.
///
/// Step one regresses `y0` on `y1` with a constant; step two runs an ADF
/// regression (no deterministic terms, AIC lag selection) on the residuals.
/// The null hypothesis is no cointegration.
///
/// Errors on mismatched lengths, fewer than [`MIN_OBSERVATIONS`] points, or a
/// constant series. Perfectly collinear inputs are not an error; they return
/// `collinear = true` with `statistic = 0` and `p_value = 1`.
pub fn engle_granger(y0: &[f64], y1: &[f64]) -> PairsResult<CointegrationTest> {
    let n = y0.len();
    if y1.len() != n {
        return Err(PairsError::InvalidInput {
            field: "y1".into(),
            reason: format!("Series lengths differ: {} vs {}", n, y1.len()),
        });
    }
    if n < MIN_OBSERVATIONS {
        return Err(PairsError::InsufficientData(format!(
            "At least {MIN_OBSERVATIONS} aligned observations required, got {n}"
        )));
    }
    if y0.windows(2).all(|w| w[0] == w[1]) {
        return Err(PairsError::DivisionByZero {
            context: "cointegration test: dependent series is constant".into(),
        });
    }

    let regression = ols::simple_ols(y0, y1)?;
    let critical_values = mackinnon::critical_values(2, n - 1)?;

    if 1.0 - regression.r_squared <= COLLINEAR_TOLERANCE {
        return Ok(CointegrationTest {
            statistic: 0.0,
            p_value: 1.0,
            critical_values,
            slope: regression.slope,
            used_lag: 0,
            nobs: n,
            collinear: true,
        });
    }

    let adf = adf::adf_regression(&regression.residuals, Trend::None, None)?;
    let p_value = mackinnon::p_value(adf.statistic, 2)?;

    Ok(CointegrationTest {
        statistic: adf.statistic,
        p_value,
        critical_values,
        slope: regression.slope,
        used_lag: adf.used_lag,
        nobs: n,
        collinear: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::distributions::Distribution;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use statrs::distribution::Normal;

    fn random_walk(rng: &mut StdRng, n: usize, start: f64) -> Vec<f64> {
        let step = Normal::new(0.0, 1.0).unwrap();
        let mut level = start;
        (0..n)
            .map(|_| {
                level += step.sample(rng);
                level
            })
            .collect()
    }

    #[test]
    fn test_linked_pair_is_cointegrated() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = random_walk(&mut rng, 500, 100.0);
        let noise = Normal::new(0.0, 0.5).unwrap();
        let b: Vec<f64> = a.iter().map(|x| 2.0 * x + 5.0 + noise.sample(&mut rng)).collect();
        let res = engle_granger(&b, &a).unwrap();
        assert!(res.p_value < 0.01, "p = {}", res.p_value);
        assert!(res.statistic < res.critical_values.one_percent);
        assert!((res.slope - 2.0).abs() < 0.05);
        assert!(!res.collinear);
    }

    #[test]
    fn test_identical_series_are_degenerate() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = random_walk(&mut rng, 100, 50.0);
        let res = engle_granger(&a, &a).unwrap();
        assert!(res.collinear);
        assert_eq!(res.p_value, 1.0);
        assert!((res.slope - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_exact_rescaling_is_degenerate() {
        let mut rng = StdRng::seed_from_u64(6);
        let a = random_walk(&mut rng, 200, 50.0);
        let b: Vec<f64> = a.iter().map(|x| 2.0 * x + 3.0).collect();
        let res = engle_granger(&b, &a).unwrap();
        assert!(res.collinear);
        assert_eq!(res.p_value, 1.0);
    }

    #[test]
    fn test_tiny_noise_still_gets_adf() {
        let mut rng = StdRng::seed_from_u64(1260);
        let a = random_walk(&mut rng, 1260, 200.0);
        for sd in [0.01, 0.02, 0.05] {
            let noise = Normal::new(0.0, sd).unwrap();
            let b: Vec<f64> = a.iter().map(|x| 2.0 * x + noise.sample(&mut rng)).collect();
            let res = engle_granger(&a, &b).unwrap();
            assert!(!res.collinear, "sd {sd}");
            assert!(res.p_value < 1e-3, "sd {sd}: p = {}", res.p_value);
            assert!(res.statistic < res.critical_values.one_percent);
        }
    }

    #[test]
    fn test_constant_series_is_an_error() {
        let mut rng = StdRng::seed_from_u64(2);
        let a = random_walk(&mut rng, 60, 50.0);
        let flat = vec![10.0; 60];
        assert!(matches!(
            engle_granger(&flat, &a),
            Err(PairsError::DivisionByZero { .. })
        ));
        assert!(matches!(
            engle_granger(&a, &flat),
            Err(PairsError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_mismatched_lengths() {
        let a: Vec<f64> = (0..30).map(f64::from).collect();
        let b: Vec<f64> = (0..29).map(f64::from).collect();
        assert!(engle_granger(&a, &b).is_err());
    }

    #[test]
    fn test_too_few_observations() {
        let a: Vec<f64> = (0..10).map(|i| f64::from(i).sin()).collect();
        let b: Vec<f64> = (0..10).map(f64::from).collect();
        assert!(matches!(
            engle_granger(&a, &b),
            Err(PairsError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_p_value_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..10 {
            let a = random_walk(&mut rng, 120, 0.0);
            let b = random_walk(&mut rng, 120, 0.0);
            let res = engle_granger(&a, &b).unwrap();
            assert!((0.0..=1.0).contains(&res.p_value));
        }
    }
}
