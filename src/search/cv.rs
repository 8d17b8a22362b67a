//! Shuffled k-fold splitting

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{PipelineError, Result};

/// A single train/validation split
#[derive(Debug, Clone)]
pub struct CvSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Shuffled k-fold splits over `n_samples` rows.
///
/// The fold count is reduced to `n_samples` when there are fewer rows than
/// folds; at least two rows are required so every fold trains on something.
pub fn k_fold(n_samples: usize, n_splits: usize, seed: u64) -> Result<Vec<CvSplit>> {
    if n_samples < 2 {
        return Err(PipelineError::data(format!(
            "Cross-validation needs at least 2 rows, got {}",
            n_samples
        )));
    }
    let n_splits = n_splits.clamp(2, n_samples);

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let base = n_samples / n_splits;
    let remainder = n_samples % n_splits;
    let mut splits = Vec::with_capacity(n_splits);
    let mut current = 0;

    for fold_idx in 0..n_splits {
        let fold_size = if fold_idx < remainder { base + 1 } else { base };
        let test_indices = indices[current..current + fold_size].to_vec();
        let train_indices: Vec<usize> = indices[..current]
            .iter()
            .chain(indices[current + fold_size..].iter())
            .copied()
            .collect();

        splits.push(CvSplit {
            train_indices,
            test_indices,
            fold_idx,
        });
        current += fold_size;
    }

    Ok(splits)
}

/// Shuffled train/test partition with `ceil(test_ratio * n)` test rows.
///
/// Returns `(train, test)` index lists; the train side keeps at least one row.
pub fn train_test_split(n_samples: usize, test_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((test_ratio * n_samples as f64).ceil() as usize).min(n_samples.saturating_sub(1));
    let train = indices[n_test..].to_vec();
    let test = indices[..n_test].to_vec();
    (train, test)
}
