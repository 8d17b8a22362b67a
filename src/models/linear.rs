//! Ridge and lasso regression

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Coordinate order for lasso updates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    Cyclic,
    Random,
}

/// Fitted linear model `y = x · coefficients + intercept`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearModel {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(PipelineError::data(format!(
                "Linear model expects {} features, got {}",
                self.coefficients.len(),
                x.ncols()
            )));
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }
}

/// Solve A x = b for symmetric positive definite A via Cholesky decomposition
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }

    // Back substitution: L^T x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }

    Some(x)
}

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::data(format!(
            "x has {} rows but y has {} values",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(PipelineError::data("Cannot fit on zero rows"));
    }
    Ok(())
}

/// Center columns and target; returns (x_c, y_c, x_mean, y_mean)
fn center(x: &Array2<f64>, y: &Array1<f64>) -> (Array2<f64>, Array1<f64>, Array1<f64>, f64) {
    let x_mean = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()));
    let y_mean = y.mean().unwrap_or(0.0);
    let x_c = x - &x_mean.clone().insert_axis(Axis(0));
    let y_c = y - y_mean;
    (x_c, y_c, x_mean, y_mean)
}

/// Ridge regression minimizing `||y - Xw||² + alpha ||w||²` with an unpenalized intercept
pub fn fit_ridge(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<LinearModel> {
    check_shapes(x, y)?;
    let (x_c, y_c, x_mean, y_mean) = center(x, y);
    let n_features = x.ncols();

    let xtx = x_c.t().dot(&x_c);
    let xty = x_c.t().dot(&y_c);

    // A vanishing alpha can leave the system singular; add a small jitter and retry
    let mut jitter = 0.0;
    let mut coefficients = None;
    for _ in 0..6 {
        let mut a = xtx.clone();
        for i in 0..n_features {
            a[[i, i]] += alpha + jitter;
        }
        if let Some(w) = cholesky_solve(&a, &xty) {
            coefficients = Some(w);
            break;
        }
        jitter = if jitter == 0.0 { 1e-10 } else { jitter * 100.0 };
    }

    let coefficients = coefficients
        .ok_or_else(|| PipelineError::data("Ridge normal equations are not positive definite"))?;
    let intercept = y_mean - coefficients.dot(&x_mean);
    Ok(LinearModel {
        coefficients,
        intercept,
    })
}

/// Soft-threshold operator for the L1 proximal step
fn soft_threshold(val: f64, threshold: f64) -> f64 {
    if val > threshold {
        val - threshold
    } else if val < -threshold {
        val + threshold
    } else {
        0.0
    }
}

/// Lasso regression minimizing `(1 / 2n) ||y - Xw||² + alpha ||w||₁` by coordinate descent
pub fn fit_lasso(
    x: &Array2<f64>,
    y: &Array1<f64>,
    alpha: f64,
    selection: Selection,
    seed: u64,
) -> Result<LinearModel> {
    const MAX_ITER: usize = 1000;
    const TOL: f64 = 1e-6;

    check_shapes(x, y)?;
    let (x_c, y_c, x_mean, y_mean) = center(x, y);
    let n_samples = x.nrows();
    let n_features = x.ncols();

    let col_norms: Vec<f64> = (0..n_features)
        .map(|j| x_c.column(j).mapv(|v| v * v).sum())
        .collect();

    let mut w = Array1::<f64>::zeros(n_features);
    let mut r = y_c.clone();
    let lambda = alpha * n_samples as f64;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n_features).collect();

    for _iter in 0..MAX_ITER {
        if selection == Selection::Random {
            order.shuffle(&mut rng);
        }

        let mut max_change: f64 = 0.0;
        for &j in &order {
            if col_norms[j] < 1e-15 {
                w[j] = 0.0;
                continue;
            }
            let old = w[j];
            let rho = x_c.column(j).dot(&r) + col_norms[j] * old;
            let new = soft_threshold(rho, lambda) / col_norms[j];
            if new != old {
                r.scaled_add(old - new, &x_c.column(j));
                w[j] = new;
                max_change = max_change.max((new - old).abs());
            }
        }

        if max_change < TOL {
            break;
        }
    }

    let intercept = y_mean - w.dot(&x_mean);
    Ok(LinearModel {
        coefficients: w,
        intercept,
    })
}
