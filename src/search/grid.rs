//! Candidate grids for each regressor family

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::SearchConfig;
use crate::models::forest::MaxFeatures;
use crate::models::linear::Selection;
use crate::models::svr::{GammaMode, SvrKernel};
use crate::models::{Hyperparameters, RegressorFamily};

const SVR_KERNELS: [SvrKernel; 4] = [SvrKernel::Linear, SvrKernel::Poly, SvrKernel::Rbf, SvrKernel::Sigmoid];
const SVR_GAMMAS: [GammaMode; 2] = [GammaMode::Scale, GammaMode::Auto];
const SVR_C: [f64; 6] = [0.01, 0.03, 0.1, 0.3, 1.0, 3.0];
const SVR_DEGREES: [u32; 3] = [2, 3, 4];
const SVR_EPSILON: [f64; 5] = [0.01, 0.03, 0.1, 0.3, 1.0];

const FOREST_ESTIMATORS: [usize; 4] = [50, 100, 130, 150];
const FOREST_MIN_SPLIT: [usize; 4] = [2, 3, 4, 5];
const FOREST_MAX_FEATURES: [MaxFeatures; 3] = [MaxFeatures::All, MaxFeatures::Sqrt, MaxFeatures::Log2];
const FOREST_MAX_DEPTH: [Option<usize>; 3] = [None, Some(8), Some(16)];

const BOOST_LEARNING_RATE: [f64; 4] = [0.01, 0.03, 0.1, 0.3];
const BOOST_COLSAMPLE: [f64; 8] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8];
const BOOST_MAX_DEPTH: [usize; 3] = [3, 5, 10];
const BOOST_ESTIMATORS: [usize; 4] = [30, 100, 300, 1000];

/// Size of the full SVR grid; degree varies for the polynomial kernel only
pub const SVR_GRID_SIZE: usize = (SVR_KERNELS.len() - 1 + SVR_DEGREES.len())
    * SVR_GAMMAS.len()
    * SVR_C.len()
    * SVR_EPSILON.len();
pub const FOREST_GRID_SIZE: usize =
    FOREST_ESTIMATORS.len() * FOREST_MIN_SPLIT.len() * FOREST_MAX_FEATURES.len() * FOREST_MAX_DEPTH.len();

/// Candidates for `family`, in evaluation order.
///
/// Ridge and lasso are searched exhaustively over seeded uniform alpha draws;
/// the other families take a seeded sample of their full grid.
pub fn candidates(family: RegressorFamily, config: &SearchConfig, seed: u64) -> Vec<Hyperparameters> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    match family {
        RegressorFamily::Ridge => draw_alphas(config, &mut rng)
            .into_iter()
            .map(|alpha| Hyperparameters::Ridge { alpha })
            .collect(),
        RegressorFamily::Lasso => {
            let alphas = draw_alphas(config, &mut rng);
            let mut grid = Vec::with_capacity(alphas.len() * 2);
            for &alpha in &alphas {
                for selection in [Selection::Cyclic, Selection::Random] {
                    grid.push(Hyperparameters::Lasso { alpha, selection });
                }
            }
            grid
        }
        RegressorFamily::Svr => sample(svr_grid(), config.svr_iter, &mut rng),
        RegressorFamily::BaggedTrees => sample(forest_grid(), config.forest_iter, &mut rng),
        RegressorFamily::BoostedTrees => {
            sample(boosting_grid(config.max_boosting_rounds), config.boosting_iter, &mut rng)
        }
    }
}

fn draw_alphas(config: &SearchConfig, rng: &mut ChaCha8Rng) -> Vec<f64> {
    (0..config.n_alphas.max(1))
        .map(|_| rng.gen_range(0.0..config.alpha_max))
        .collect()
}

/// Shuffle the full grid and keep the first `n_iter` entries
fn sample(mut grid: Vec<Hyperparameters>, n_iter: usize, rng: &mut ChaCha8Rng) -> Vec<Hyperparameters> {
    grid.shuffle(rng);
    grid.truncate(n_iter.max(1));
    grid
}

fn svr_grid() -> Vec<Hyperparameters> {
    let mut grid = Vec::new();
    for kernel in SVR_KERNELS {
        // Degree only matters for the polynomial kernel
        let degrees: &[u32] = if kernel == SvrKernel::Poly { &SVR_DEGREES } else { &[3] };
        for gamma in SVR_GAMMAS {
            for c in SVR_C {
                for &degree in degrees {
                    for epsilon in SVR_EPSILON {
                        grid.push(Hyperparameters::Svr {
                            kernel,
                            gamma,
                            c,
                            degree,
                            epsilon,
                        });
                    }
                }
            }
        }
    }
    grid
}

fn forest_grid() -> Vec<Hyperparameters> {
    let mut grid = Vec::new();
    for n_estimators in FOREST_ESTIMATORS {
        for min_samples_split in FOREST_MIN_SPLIT {
            for max_features in FOREST_MAX_FEATURES {
                for max_depth in FOREST_MAX_DEPTH {
                    grid.push(Hyperparameters::BaggedTrees {
                        n_estimators,
                        min_samples_split,
                        max_features,
                        max_depth,
                    });
                }
            }
        }
    }
    grid
}

fn boosting_grid(max_rounds: usize) -> Vec<Hyperparameters> {
    let mut rounds: Vec<usize> = BOOST_ESTIMATORS.iter().map(|&n| n.min(max_rounds.max(1))).collect();
    rounds.dedup();

    let mut grid = Vec::new();
    for learning_rate in BOOST_LEARNING_RATE {
        for colsample_bytree in BOOST_COLSAMPLE {
            for max_depth in BOOST_MAX_DEPTH {
                for &n_estimators in &rounds {
                    grid.push(Hyperparameters::BoostedTrees {
                        learning_rate,
                        colsample_bytree,
                        max_depth,
                        n_estimators,
                    });
                }
            }
        }
    }
    grid
}
