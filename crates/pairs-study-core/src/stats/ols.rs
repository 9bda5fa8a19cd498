use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::PairsError;
use crate::PairsResult;

/// Closed-form fit of `y = intercept + slope * x`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub residuals: Vec<f64>,
}

/// Ordinary least squares of `y` on a single regressor plus a constant.
///
/// Fails when `x` has zero variance (the slope is undefined) or the series
/// lengths differ.
pub fn simple_ols(y: &[f64], x: &[f64]) -> PairsResult<SimpleFit> {
    let n = y.len();
    if x.len() != n {
        return Err(PairsError::InvalidInput {
            field: "x".into(),
            reason: format!("Regressor has {} values but response has {}", x.len(), n),
        });
    }
    if n < 2 {
        return Err(PairsError::InsufficientData(format!(
            "OLS needs at least 2 observations, got {n}"
        )));
    }

    let n_f = n as f64;
    let mean_x = x.iter().sum::<f64>() / n_f;
    let mean_y = y.iter().sum::<f64>() / n_f;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 {
        return Err(PairsError::DivisionByZero {
            context: "OLS slope: regressor has zero variance".into(),
        });
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let residuals: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| yi - intercept - slope * xi)
        .collect();
    let ssr: f64 = residuals.iter().map(|e| e * e).sum();
    let r_squared = if syy == 0.0 { 1.0 } else { 1.0 - ssr / syy };

    Ok(SimpleFit {
        slope,
        intercept,
        r_squared,
        residuals,
    })
}

/// General least-squares fit with coefficient standard errors.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub params: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub ssr: f64,
    pub nobs: usize,
}

impl OlsFit {
    pub fn t_value(&self, idx: usize) -> f64 {
        self.params[idx] / self.std_errors[idx]
    }

    /// Gaussian log-likelihood at the fitted parameters.
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion, `-2 llf + 2 k`.
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.params.len() as f64
    }
}

/// Solve `y = X b + e` through the normal equations.
///
/// `context` names the caller in error messages.
pub fn fit(y: &DVector<f64>, x: &DMatrix<f64>, context: &str) -> PairsResult<OlsFit> {
    let nobs = x.nrows();
    let k = x.ncols();
    if y.len() != nobs {
        return Err(PairsError::InvalidInput {
            field: context.into(),
            reason: format!("Response has {} rows but design has {}", y.len(), nobs),
        });
    }
    if nobs <= k {
        return Err(PairsError::InsufficientData(format!(
            "{context}: {nobs} observations for {k} parameters"
        )));
    }

    let xt = x.transpose();
    let xtx_inv = (&xt * x)
        .try_inverse()
        .ok_or_else(|| PairsError::SingularMatrix {
            context: context.into(),
        })?;
    let beta = &xtx_inv * (&xt * y);
    let resid = y - x * &beta;
    let ssr = resid.norm_squared();
    let sigma2 = ssr / (nobs - k) as f64;

    let std_errors: Vec<f64> = (0..k).map(|i| (sigma2 * xtx_inv[(i, i)]).sqrt()).collect();

    Ok(OlsFit {
        params: beta.iter().copied().collect(),
        std_errors,
        ssr,
        nobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_ols_exact_line() {
        let x: Vec<f64> = (0..10).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 + 2.0 * v).collect();
        let fit = simple_ols(&y, &x).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 3.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert!(fit.residuals.iter().all(|e| e.abs() < 1e-9));
    }

    #[test]
    fn test_simple_ols_constant_regressor_fails() {
        let x = [5.0; 8];
        let y: Vec<f64> = (0..8).map(f64::from).collect();
        assert!(matches!(
            simple_ols(&y, &x),
            Err(PairsError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_simple_ols_residuals_orthogonal_to_regressor() {
        let x: Vec<f64> = (0..50).map(|i| (i as f64 * 0.37).sin() * 10.0 + i as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 1.5 * v + ((i * 7) % 5) as f64)
            .collect();
        let fit = simple_ols(&y, &x).unwrap();
        let dot: f64 = fit.residuals.iter().zip(&x).map(|(e, xi)| e * xi).sum();
        let sum: f64 = fit.residuals.iter().sum();
        assert!(dot.abs() < 1e-6, "residuals not orthogonal: {dot}");
        assert!(sum.abs() < 1e-8);
    }

    #[test]
    fn test_fit_matches_simple_ols() {
        let xs: Vec<f64> = (0..30).map(|i| (i as f64).sqrt()).collect();
        let ys: Vec<f64> = xs
            .iter()
            .enumerate()
            .map(|(i, v)| 0.5 - 1.25 * v + if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();
        let design = DMatrix::from_fn(xs.len(), 2, |r, c| if c == 0 { xs[r] } else { 1.0 });
        let fitted = fit(&DVector::from_vec(ys.clone()), &design, "test").unwrap();
        let simple = simple_ols(&ys, &xs).unwrap();
        assert!((fitted.params[0] - simple.slope).abs() < 1e-9);
        assert!((fitted.params[1] - simple.intercept).abs() < 1e-9);
        assert!(fitted.std_errors.iter().all(|s| *s > 0.0));
    }

    #[test]
    fn test_fit_singular_design() {
        let design = DMatrix::from_fn(10, 2, |r, _| r as f64);
        let y = DVector::from_fn(10, |r, _| r as f64 * 2.0);
        assert!(matches!(
            fit(&y, &design, "dup columns"),
            Err(PairsError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn test_fit_too_few_observations() {
        let design = DMatrix::from_element(2, 2, 1.0);
        let y = DVector::from_element(2, 1.0);
        assert!(matches!(
            fit(&y, &design, "tiny"),
            Err(PairsError::InsufficientData(_))
        ));
    }
}
