//! MacKinnon response-surface approximations for Dickey-Fuller type
//! statistics with a constant term.
//!
//! `n_vars` is the number of I(1) series in the test: 1 for a plain unit-root
//! test, 2 for an Engle-Granger test on a pair.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

use crate::error::PairsError;
use crate::PairsResult;

// MacKinnon (1994), constant case, rows indexed by n_vars - 1.
const TAU_MAX: [f64; 2] = [2.74, 0.92];
const TAU_MIN: [f64; 2] = [-18.83, -18.86];
const TAU_STAR: [f64; 2] = [-1.61, -2.62];
const TAU_SMALL_P: [[f64; 3]; 2] = [[2.1659, 1.4412, 0.038269], [2.92, 1.5012, 0.039796]];
const TAU_LARGE_P: [[f64; 4]; 2] = [
    [1.7339, 0.93202, -0.12745, -0.010368],
    [2.1945, 0.64695, -0.29198, -0.042377],
];

// MacKinnon (2010), constant case: [1%, 5%, 10%] x [b0, b1, b2, b3].
const TAU_2010: [[[f64; 4]; 3]; 2] = [
    [
        [-3.43035, -6.5393, -16.786, -79.433],
        [-2.86154, -2.8903, -4.234, -40.040],
        [-2.56677, -1.5384, -2.809, 0.0],
    ],
    [
        [-3.89644, -10.9519, -33.527, 0.0],
        [-3.33613, -6.1101, -6.823, 0.0],
        [-3.04445, -4.2412, -2.720, 0.0],
    ],
];

/// Critical values of the test statistic at the usual significance levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_percent: f64,
    pub five_percent: f64,
    pub ten_percent: f64,
}

fn table_row(n_vars: usize) -> PairsResult<usize> {
    if n_vars == 0 || n_vars > TAU_MAX.len() {
        return Err(PairsError::InvalidInput {
            field: "n_vars".into(),
            reason: format!("MacKinnon tables cover 1 or 2 series, got {n_vars}"),
        });
    }
    Ok(n_vars - 1)
}

fn polyval(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Asymptotic p-value of a unit-root / cointegration t-statistic.
pub fn p_value(statistic: f64, n_vars: usize) -> PairsResult<f64> {
    let row = table_row(n_vars)?;
    if statistic > TAU_MAX[row] {
        return Ok(1.0);
    }
    if statistic < TAU_MIN[row] {
        return Ok(0.0);
    }
    let z = if statistic <= TAU_STAR[row] {
        polyval(&TAU_SMALL_P[row], statistic)
    } else {
        polyval(&TAU_LARGE_P[row], statistic)
    };
    Ok(standard_normal_cdf(z))
}

/// Finite-sample critical values for `nobs` observations.
pub fn critical_values(n_vars: usize, nobs: usize) -> PairsResult<CriticalValues> {
    let row = table_row(n_vars)?;
    if nobs == 0 {
        return Err(PairsError::InsufficientData(
            "Critical values need at least one observation".into(),
        ));
    }
    let inv = 1.0 / nobs as f64;
    let table = &TAU_2010[row];
    Ok(CriticalValues {
        one_percent: polyval(&table[0], inv),
        five_percent: polyval(&table[1], inv),
        ten_percent: polyval(&table[2], inv),
    })
}
