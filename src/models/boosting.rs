//! Gradient-boosted regression trees under squared loss

use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use crate::error::{PipelineError, Result};

/// L2 penalty on leaf weights
const LEAF_LAMBDA: f64 = 1.0;

/// Fitted boosted ensemble: `base + learning_rate * Σ tree(x)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingModel {
    pub n_features: usize,
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

/// Settings for one boosted fit
#[derive(Debug, Clone, Copy)]
pub struct BoostingSettings {
    pub learning_rate: f64,
    /// Fraction of columns each tree may split on
    pub colsample_bytree: f64,
    pub max_depth: usize,
    pub n_estimators: usize,
}

impl BoostingModel {
    pub fn fit(
        x: &Array2<f64>,
        y: &Array1<f64>,
        settings: &BoostingSettings,
        seed: u64,
    ) -> Result<Self> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(PipelineError::data(format!(
                "Boosting needs matching non-empty inputs, got {} rows and {} targets",
                n,
                y.len()
            )));
        }
        if !(settings.learning_rate > 0.0) {
            return Err(PipelineError::data(format!(
                "Boosting learning rate must be positive, got {}",
                settings.learning_rate
            )));
        }

        let n_features = x.ncols();
        let per_tree = ((settings.colsample_bytree * n_features as f64).round() as usize)
            .clamp(1, n_features.max(1));
        let params = TreeParams {
            max_depth: Some(settings.max_depth),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            leaf_lambda: LEAF_LAMBDA,
        };

        let base_score = y.mean().unwrap_or(0.0);
        let mut current = Array1::from_elem(n, base_score);
        let rows: Vec<usize> = (0..n).collect();
        let mut columns: Vec<usize> = (0..n_features).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(settings.n_estimators);

        for _round in 0..settings.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(current.iter()).map(|(t, p)| t - p).collect();
            columns.shuffle(&mut rng);
            let mut subset = columns[..per_tree.min(columns.len())].to_vec();
            subset.sort_unstable();

            let tree = RegressionTree::fit(x, &residuals, &rows, &subset, &params, &mut rng);
            for (i, row) in x.outer_iter().enumerate() {
                current[i] += settings.learning_rate * tree.predict_row(&row);
            }
            trees.push(tree);
        }

        Ok(Self {
            n_features,
            base_score,
            learning_rate: settings.learning_rate,
            trees,
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(PipelineError::data(format!(
                "Boosting model expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        Ok(x.outer_iter()
            .map(|row| {
                self.base_score
                    + self.learning_rate
                        * self.trees.iter().map(|t| t.predict_row(&row)).sum::<f64>()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(n_estimators: usize) -> BoostingSettings {
        BoostingSettings {
            learning_rate: 0.3,
            colsample_bytree: 0.5,
            max_depth: 3,
            n_estimators,
        }
    }

    #[test]
    fn test_more_rounds_reduce_training_error() {
        let x = Array2::from_shape_fn((50, 2), |(i, j)| (i * (j + 1)) as f64 / 10.0);
        let y: Array1<f64> = x.column(0).mapv(|v| v.sin() * 3.0);
        let sse = |model: &BoostingModel| {
            let pred = model.predict(&x).unwrap();
            pred.iter().zip(y.iter()).map(|(p, t)| (p - t).powi(2)).sum::<f64>()
        };
        let few = BoostingModel::fit(&x, &y, &settings(2), 42).unwrap();
        let many = BoostingModel::fit(&x, &y, &settings(40), 42).unwrap();
        assert!(sse(&many) < sse(&few));
    }

    #[test]
    fn test_zero_rounds_predicts_mean() {
        let x = Array2::from_shape_fn((4, 1), |(i, _)| i as f64);
        let y = Array1::from(vec![1.0, 2.0, 3.0, 6.0]);
        let model = BoostingModel::fit(&x, &y, &settings(0), 1).unwrap();
        assert_eq!(model.predict(&x).unwrap(), Array1::from_elem(4, 3.0));
    }
}
