//! Per-cluster model search
//!
//! Each family is cross-validated over its candidate grid, the best candidate is
//! refit on the whole training split, and the family with the highest held-out
//! adjusted R² wins. Equal test scores go to the higher-priority family.

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::cv::k_fold;
use super::grid::candidates;
use super::metrics::{adjusted_r2_score, rank_key};
use crate::config::SearchConfig;
use crate::error::{PipelineError, Result};
use crate::models::{FittedRegressor, Hyperparameters, RegressorFamily};

/// Train/test matrices for one cluster
pub struct ClusterData<'a> {
    pub train_x: &'a Array2<f64>,
    pub train_y: &'a Array1<f64>,
    pub test_x: &'a Array2<f64>,
    pub test_y: &'a Array1<f64>,
}

/// Where a search runs, for error and log context
#[derive(Debug, Clone, Copy)]
pub struct SearchScope<'a> {
    pub target: &'a str,
    pub cluster: usize,
}

/// Scores of one family's refit candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyScore {
    pub family: RegressorFamily,
    pub hyperparameters: Hyperparameters,
    /// Mean adjusted R² over the validation folds
    pub cv_score: f64,
    /// Adjusted R² on the held-out split
    pub test_score: f64,
}

/// Result of searching all five families
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub winner: FamilyScore,
    pub model: FittedRegressor,
    /// Every family in priority order, the winner included
    pub families: Vec<FamilyScore>,
}

/// Cross-validated mean adjusted R² of every candidate.
///
/// Candidate-fold pairs are evaluated on the rayon pool. A candidate that fails to
/// fit or predict on any fold scores `f64::NEG_INFINITY`; the call only fails when
/// every candidate does.
pub fn cross_validate(
    params: &[Hyperparameters],
    x: &Array2<f64>,
    y: &Array1<f64>,
    folds: usize,
    seed: u64,
) -> Result<Vec<f64>> {
    let splits = k_fold(x.nrows(), folds, seed)?;
    let jobs: Vec<(usize, usize)> = (0..params.len())
        .flat_map(|c| (0..splits.len()).map(move |f| (c, f)))
        .collect();

    let fold_scores: Vec<Result<f64>> = jobs
        .par_iter()
        .map(|&(c, f)| -> Result<f64> {
            let split = &splits[f];
            let train_x = x.select(Axis(0), &split.train_indices);
            let train_y = y.select(Axis(0), &split.train_indices);
            let val_x = x.select(Axis(0), &split.test_indices);
            let val_y = y.select(Axis(0), &split.test_indices);

            let model = params[c].fit(&train_x, &train_y, seed)?;
            let pred = model.predict(&val_x)?;
            Ok(adjusted_r2_score(&val_y.to_vec(), &pred.to_vec(), x.ncols()))
        })
        .collect();

    let n_folds = splits.len() as f64;
    let mut scores = vec![0.0; params.len()];
    let mut failed = vec![false; params.len()];
    let mut first_error = None;
    for (&(c, _), result) in jobs.iter().zip(fold_scores) {
        match result {
            Ok(score) => scores[c] += score / n_folds,
            Err(e) => {
                if !failed[c] {
                    tracing::warn!(candidate = %params[c].describe(), error = %e, "candidate failed, ranked last");
                }
                failed[c] = true;
                first_error.get_or_insert(e);
            }
        }
    }

    if !failed.is_empty() && failed.iter().all(|&f| f) {
        if let Some(e) = first_error {
            return Err(e);
        }
    }
    for (score, &f) in scores.iter_mut().zip(&failed) {
        if f {
            *score = f64::NEG_INFINITY;
        }
    }
    Ok(scores)
}

/// Index of the highest score; ties keep the earlier index and NaN ranks last
pub fn best_index(scores: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some(b) if rank_key(score) <= rank_key(scores[b]) => {}
            _ => best = Some(i),
        }
    }
    best
}

fn search_family(
    family: RegressorFamily,
    data: &ClusterData<'_>,
    config: &SearchConfig,
    seed: u64,
) -> Result<(FamilyScore, FittedRegressor)> {
    let grid = candidates(family, config, seed.wrapping_add(family.priority() as u64));
    let cv_scores = cross_validate(&grid, data.train_x, data.train_y, config.folds, seed)?;
    let best = best_index(&cv_scores)
        .ok_or_else(|| PipelineError::data(format!("No {} candidates to evaluate", family)))?;

    let hyperparameters = grid[best].clone();
    let model = hyperparameters.fit(data.train_x, data.train_y, seed)?;

    // A cluster too small to hold out rows is scored on its training split
    let (eval_x, eval_y) = if data.test_x.nrows() > 0 {
        (data.test_x, data.test_y)
    } else {
        (data.train_x, data.train_y)
    };
    let pred = model.predict(eval_x)?;
    let test_score = adjusted_r2_score(&eval_y.to_vec(), &pred.to_vec(), eval_x.ncols());

    Ok((
        FamilyScore {
            family,
            hyperparameters,
            cv_score: cv_scores[best],
            test_score,
        },
        model,
    ))
}

/// Search all families for one cluster and keep the best by test score.
///
/// A failure in any family fails the whole cluster.
pub fn find_best_model(
    data: &ClusterData<'_>,
    config: &SearchConfig,
    scope: SearchScope<'_>,
    seed: u64,
) -> Result<SearchOutcome> {
    let mut families: Vec<FamilyScore> = Vec::with_capacity(RegressorFamily::ALL.len());
    let mut winner: Option<(usize, FittedRegressor)> = None;

    for family in RegressorFamily::ALL {
        let (score, model) = search_family(family, data, config, seed).map_err(|e| {
            tracing::error!(
                target_name = scope.target,
                cluster = scope.cluster,
                %family,
                error = %e,
                "model search failed"
            );
            PipelineError::ModelSearchFailure {
                target: scope.target.to_string(),
                cluster: scope.cluster,
                family,
                reason: e.to_string(),
            }
        })?;

        tracing::debug!(
            target_name = scope.target,
            cluster = scope.cluster,
            %family,
            cv_score = score.cv_score,
            test_score = score.test_score,
            params = %score.hyperparameters.describe(),
            "family searched"
        );

        // ALL is in priority order, so only a strictly better score replaces the leader
        let replace = match &winner {
            None => true,
            Some((idx, _)) => {
                rank_key(score.test_score) > rank_key(families[*idx].test_score)
            }
        };
        if replace {
            winner = Some((families.len(), model));
        }
        families.push(score);
    }

    let (idx, model) = winner.ok_or_else(|| PipelineError::ModelSearchFailure {
        target: scope.target.to_string(),
        cluster: scope.cluster,
        family: RegressorFamily::Ridge,
        reason: "no family evaluated".to_string(),
    })?;
    let winner = families[idx].clone();

    tracing::info!(
        target_name = scope.target,
        cluster = scope.cluster,
        family = %winner.family,
        test_score = winner.test_score,
        "best model selected"
    );

    Ok(SearchOutcome {
        winner,
        model,
        families,
    })
}
