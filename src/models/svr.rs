//! Epsilon-insensitive support vector regression
//!
//! Solved in the dual by coordinate descent. The bias is absorbed into the kernel
//! as a constant feature (`K(a, b) + 1`), which removes the equality constraint
//! and lets every coordinate be updated independently.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Maximum number of samples for eager kernel matrix computation
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel family as exposed to the search grid
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SvrKernel {
    Linear,
    Poly,
    Rbf,
    Sigmoid,
}

/// How the kernel coefficient is derived from the training data
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GammaMode {
    /// `1 / (n_features * var(X))`
    Scale,
    /// `1 / n_features`
    Auto,
}

/// Kernel function with resolved coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// K(x, y) = x · y
    Linear,
    /// K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: u32, gamma: f64, coef0: f64 },
    /// K(x, y) = exp(-γ * ||x - y||²)
    Rbf { gamma: f64 },
    /// K(x, y) = tanh(γ * x · y + r)
    Sigmoid { gamma: f64, coef0: f64 },
}

impl KernelType {
    pub fn eval(&self, a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
        match self {
            KernelType::Linear => a.dot(b),
            KernelType::Polynomial {
                degree,
                gamma,
                coef0,
            } => (gamma * a.dot(b) + coef0).powi(*degree as i32),
            KernelType::Rbf { gamma } => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                (-gamma * norm_sq).exp()
            }
            KernelType::Sigmoid { gamma, coef0 } => (gamma * a.dot(b) + coef0).tanh(),
        }
    }
}

/// Resolve `gamma` for the given training matrix
pub fn resolve_gamma(mode: GammaMode, x: &Array2<f64>) -> f64 {
    let n_features = x.ncols().max(1) as f64;
    match mode {
        GammaMode::Auto => 1.0 / n_features,
        GammaMode::Scale => {
            let n = x.len() as f64;
            if n == 0.0 {
                return 1.0;
            }
            let mean = x.sum() / n;
            let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            if var > 0.0 {
                1.0 / (n_features * var)
            } else {
                1.0
            }
        }
    }
}

/// SVR solver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvrConfig {
    pub c: f64,
    pub epsilon: f64,
    pub kernel: KernelType,
    pub tol: f64,
    pub max_iter: usize,
}

/// Fitted SVR: `f(x) = Σ βᵢ (K(svᵢ, x) + 1)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvrModel {
    pub kernel: KernelType,
    pub support_vectors: Array2<f64>,
    pub dual_coef: Array1<f64>,
}

impl SvrModel {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, config: &SvrConfig) -> Result<Self> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(PipelineError::data(format!(
                "SVR needs matching non-empty inputs, got {} rows and {} targets",
                n,
                y.len()
            )));
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(PipelineError::data(format!(
                "Dataset has {} samples, exceeding the maximum {} for the SVR kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let mut gram = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let v = config.kernel.eval(&x.row(i), &x.row(j)) + 1.0;
                gram[[i, j]] = v;
                gram[[j, i]] = v;
            }
        }
        if gram.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::data("SVR kernel produced non-finite values"));
        }

        let mut beta = Array1::<f64>::zeros(n);
        // f = gram · beta, kept in sync with every coordinate change
        let mut f = Array1::<f64>::zeros(n);

        for _sweep in 0..config.max_iter {
            let mut max_change: f64 = 0.0;
            for i in 0..n {
                let kii = gram[[i, i]];
                if kii <= 1e-12 {
                    continue;
                }
                let g = f[i] - y[i];
                let unclipped = soft_threshold(kii * beta[i] - g, config.epsilon) / kii;
                let new = unclipped.clamp(-config.c, config.c);
                let delta = new - beta[i];
                if delta != 0.0 {
                    f.scaled_add(delta, &gram.column(i));
                    beta[i] = new;
                    max_change = max_change.max(delta.abs());
                }
            }
            if max_change < config.tol {
                break;
            }
        }

        let support: Vec<usize> = (0..n).filter(|&i| beta[i].abs() > 1e-12).collect();
        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support.len());
        for (row, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(row).assign(&x.row(idx));
            dual_coef[row] = beta[idx];
        }

        Ok(Self {
            kernel: config.kernel.clone(),
            support_vectors,
            dual_coef,
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.support_vectors.nrows() > 0 && x.ncols() != self.support_vectors.ncols() {
            return Err(PipelineError::data(format!(
                "SVR expects {} features, got {}",
                self.support_vectors.ncols(),
                x.ncols()
            )));
        }
        Ok(x.outer_iter()
            .map(|sample| {
                self.support_vectors
                    .outer_iter()
                    .zip(self.dual_coef.iter())
                    .map(|(sv, coef)| coef * (self.kernel.eval(&sv, &sample) + 1.0))
                    .sum()
            })
            .collect())
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.nrows()
    }
}

fn soft_threshold(val: f64, threshold: f64) -> f64 {
    if val > threshold {
        val - threshold
    } else if val < -threshold {
        val + threshold
    } else {
        0.0
    }
}
