//! Bagged decision-tree ensemble

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use crate::error::{PipelineError, Result};

/// Number of features tried at each split
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features.max(1);
        let k = match self {
            MaxFeatures::All => n,
            MaxFeatures::Sqrt => (n as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n as f64).log2() as usize,
        };
        k.clamp(1, n)
    }
}

/// Fitted bootstrap-aggregated trees; the prediction is the mean over trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl ForestModel {
    /// Fit `n_estimators` trees on bootstrap samples.
    ///
    /// Tree `i` draws its sample and split features from seed `seed + i`, so the
    /// ensemble does not depend on thread scheduling.
    pub fn fit(
        x: &Array2<f64>,
        y: &Array1<f64>,
        n_estimators: usize,
        min_samples_split: usize,
        max_features: MaxFeatures,
        max_depth: Option<usize>,
        seed: u64,
    ) -> Result<Self> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(PipelineError::data(format!(
                "Forest needs matching non-empty inputs, got {} rows and {} targets",
                n,
                y.len()
            )));
        }
        if n_estimators == 0 {
            return Err(PipelineError::data("Forest needs at least one estimator"));
        }

        let params = TreeParams {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            min_samples_leaf: 1,
            max_features: Some(max_features.resolve(x.ncols())),
            leaf_lambda: 0.0,
        };
        let features: Vec<usize> = (0..x.ncols()).collect();
        let targets: Vec<f64> = y.to_vec();

        let trees: Vec<RegressionTree> = (0..n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, &targets, &sample, &features, &params, &mut rng)
            })
            .collect();

        Ok(Self {
            n_features: x.ncols(),
            trees,
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(PipelineError::data(format!(
                "Forest expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        let n_trees = self.trees.len().max(1) as f64;
        Ok(x.outer_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(&row)).sum::<f64>() / n_trees)
            .collect())
    }
}
