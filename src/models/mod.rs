//! Regressor families searched per cluster
//!
//! Every family is a closed enum variant: [`Hyperparameters`] describes a
//! candidate, [`FittedRegressor`] holds the fitted parameters that are persisted
//! in the model registry.

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod svr;
pub mod tree;

use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use boosting::{BoostingModel, BoostingSettings};
use forest::{ForestModel, MaxFeatures};
use linear::{fit_lasso, fit_ridge, LinearModel, Selection};
use svr::{resolve_gamma, GammaMode, KernelType, SvrConfig, SvrKernel, SvrModel};

/// Dual coordinate-descent sweeps for SVR fits
const SVR_MAX_SWEEPS: usize = 500;
const SVR_TOL: f64 = 1e-4;

/// The five regressor families in tie-break priority order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RegressorFamily {
    Ridge,
    Lasso,
    Svr,
    BaggedTrees,
    BoostedTrees,
}

impl RegressorFamily {
    /// All families, highest priority first
    pub const ALL: [RegressorFamily; 5] = [
        RegressorFamily::Ridge,
        RegressorFamily::Lasso,
        RegressorFamily::Svr,
        RegressorFamily::BaggedTrees,
        RegressorFamily::BoostedTrees,
    ];

    /// Lower value wins ties between equal test scores
    pub fn priority(self) -> usize {
        match self {
            RegressorFamily::Ridge => 0,
            RegressorFamily::Lasso => 1,
            RegressorFamily::Svr => 2,
            RegressorFamily::BaggedTrees => 3,
            RegressorFamily::BoostedTrees => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RegressorFamily::Ridge => "ridge",
            RegressorFamily::Lasso => "lasso",
            RegressorFamily::Svr => "svr",
            RegressorFamily::BaggedTrees => "bagged_trees",
            RegressorFamily::BoostedTrees => "boosted_trees",
        }
    }
}

impl fmt::Display for RegressorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One candidate configuration of a family
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Hyperparameters {
    Ridge {
        alpha: f64,
    },
    Lasso {
        alpha: f64,
        selection: Selection,
    },
    Svr {
        kernel: SvrKernel,
        gamma: GammaMode,
        c: f64,
        /// Only used by the polynomial kernel
        degree: u32,
        epsilon: f64,
    },
    BaggedTrees {
        n_estimators: usize,
        min_samples_split: usize,
        max_features: MaxFeatures,
        max_depth: Option<usize>,
    },
    BoostedTrees {
        learning_rate: f64,
        colsample_bytree: f64,
        max_depth: usize,
        n_estimators: usize,
    },
}

impl Hyperparameters {
    pub fn family(&self) -> RegressorFamily {
        match self {
            Hyperparameters::Ridge { .. } => RegressorFamily::Ridge,
            Hyperparameters::Lasso { .. } => RegressorFamily::Lasso,
            Hyperparameters::Svr { .. } => RegressorFamily::Svr,
            Hyperparameters::BaggedTrees { .. } => RegressorFamily::BaggedTrees,
            Hyperparameters::BoostedTrees { .. } => RegressorFamily::BoostedTrees,
        }
    }

    /// Short human-readable form for summary tables
    pub fn describe(&self) -> String {
        match self {
            Hyperparameters::Ridge { alpha } => format!("alpha={:.4}", alpha),
            Hyperparameters::Lasso { alpha, selection } => {
                format!("alpha={:.4}, selection={:?}", alpha, selection).to_lowercase()
            }
            Hyperparameters::Svr {
                kernel,
                gamma,
                c,
                degree,
                epsilon,
            } => {
                let mut s = format!("kernel={:?}, gamma={:?}, C={}, epsilon={}", kernel, gamma, c, epsilon)
                    .to_lowercase();
                if *kernel == SvrKernel::Poly {
                    s.push_str(&format!(", degree={}", degree));
                }
                s
            }
            Hyperparameters::BaggedTrees {
                n_estimators,
                min_samples_split,
                max_features,
                max_depth,
            } => format!(
                "n_estimators={}, min_samples_split={}, max_features={:?}, max_depth={}",
                n_estimators,
                min_samples_split,
                max_features,
                max_depth.map_or("none".to_string(), |d| d.to_string())
            ),
            Hyperparameters::BoostedTrees {
                learning_rate,
                colsample_bytree,
                max_depth,
                n_estimators,
            } => format!(
                "learning_rate={}, colsample_bytree={}, max_depth={}, n_estimators={}",
                learning_rate, colsample_bytree, max_depth, n_estimators
            ),
        }
    }

    /// Fit this candidate on `x`, `y`
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<FittedRegressor> {
        let fitted = match self {
            Hyperparameters::Ridge { alpha } => FittedRegressor::Ridge(fit_ridge(x, y, *alpha)?),
            Hyperparameters::Lasso { alpha, selection } => {
                FittedRegressor::Lasso(fit_lasso(x, y, *alpha, *selection, seed)?)
            }
            Hyperparameters::Svr {
                kernel,
                gamma,
                c,
                degree,
                epsilon,
            } => {
                let gamma = resolve_gamma(*gamma, x);
                let kernel = match kernel {
                    SvrKernel::Linear => KernelType::Linear,
                    SvrKernel::Poly => KernelType::Polynomial {
                        degree: *degree,
                        gamma,
                        coef0: 0.0,
                    },
                    SvrKernel::Rbf => KernelType::Rbf { gamma },
                    SvrKernel::Sigmoid => KernelType::Sigmoid { gamma, coef0: 0.0 },
                };
                let config = SvrConfig {
                    c: *c,
                    epsilon: *epsilon,
                    kernel,
                    tol: SVR_TOL,
                    max_iter: SVR_MAX_SWEEPS,
                };
                FittedRegressor::Svr(SvrModel::fit(x, y, &config)?)
            }
            Hyperparameters::BaggedTrees {
                n_estimators,
                min_samples_split,
                max_features,
                max_depth,
            } => FittedRegressor::BaggedTrees(ForestModel::fit(
                x,
                y,
                *n_estimators,
                *min_samples_split,
                *max_features,
                *max_depth,
                seed,
            )?),
            Hyperparameters::BoostedTrees {
                learning_rate,
                colsample_bytree,
                max_depth,
                n_estimators,
            } => {
                let settings = BoostingSettings {
                    learning_rate: *learning_rate,
                    colsample_bytree: *colsample_bytree,
                    max_depth: *max_depth,
                    n_estimators: *n_estimators,
                };
                FittedRegressor::BoostedTrees(BoostingModel::fit(x, y, &settings, seed)?)
            }
        };
        Ok(fitted)
    }
}

/// Fitted parameters of the winning family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FittedRegressor {
    Ridge(LinearModel),
    Lasso(LinearModel),
    Svr(SvrModel),
    BaggedTrees(ForestModel),
    BoostedTrees(BoostingModel),
}

impl FittedRegressor {
    pub fn family(&self) -> RegressorFamily {
        match self {
            FittedRegressor::Ridge(_) => RegressorFamily::Ridge,
            FittedRegressor::Lasso(_) => RegressorFamily::Lasso,
            FittedRegressor::Svr(_) => RegressorFamily::Svr,
            FittedRegressor::BaggedTrees(_) => RegressorFamily::BaggedTrees,
            FittedRegressor::BoostedTrees(_) => RegressorFamily::BoostedTrees,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            FittedRegressor::Ridge(m) | FittedRegressor::Lasso(m) => m.predict(x),
            FittedRegressor::Svr(m) => m.predict(x),
            FittedRegressor::BaggedTrees(m) => m.predict(x),
            FittedRegressor::BoostedTrees(m) => m.predict(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_priority_follows_all_order() {
        for (i, family) in RegressorFamily::ALL.iter().enumerate() {
            assert_eq!(family.priority(), i);
        }
    }

    #[test]
    fn test_family_serializes_snake_case() {
        let json = serde_json::to_string(&RegressorFamily::BaggedTrees).unwrap();
        assert_eq!(json, "\"bagged_trees\"");
        assert_eq!(RegressorFamily::BoostedTrees.to_string(), "boosted_trees");
    }

    #[test]
    fn test_fit_dispatches_to_family() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![1.0, 3.0, 5.0, 7.0];
        let params = Hyperparameters::Ridge { alpha: 1e-6 };
        let fitted = params.fit(&x, &y, 0).unwrap();
        assert_eq!(fitted.family(), RegressorFamily::Ridge);
        let pred = fitted.predict(&array![[4.0]]).unwrap();
        assert!((pred[0] - 9.0).abs() < 1e-3);
    }

    #[test]
    fn test_poly_degree_only_described_for_poly() {
        let rbf = Hyperparameters::Svr {
            kernel: SvrKernel::Rbf,
            gamma: GammaMode::Scale,
            c: 1.0,
            degree: 3,
            epsilon: 0.1,
        };
        assert!(!rbf.describe().contains("degree"));
    }

    #[test]
    fn test_hyperparameters_round_trip_json() {
        let params = Hyperparameters::BaggedTrees {
            n_estimators: 50,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
        };
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"family\":\"bagged_trees\""));
        let back: Hyperparameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
