//! Tests for the per-cluster model search across the five regressor families

use clustreg::config::SearchConfig;
use clustreg::models::{Hyperparameters, RegressorFamily};
use clustreg::search::cv::{k_fold, train_test_split};
use clustreg::search::finder::best_index;
use clustreg::search::grid::candidates;
use clustreg::search::{adjusted_r2_score, find_best_model, ClusterData, SearchScope};
use clustreg::PipelineError;
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// `y = 3 x0 - 2 x1 + 1` plus a little uniform noise
fn linear_data(rows: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let x = Array2::from_shape_fn((rows, 2), |_| rng.gen_range(-2.0..2.0));
    let y = x
        .outer_iter()
        .map(|row| 3.0 * row[0] - 2.0 * row[1] + 1.0 + rng.gen_range(-0.05..0.05))
        .collect();
    (x, y)
}

fn scope() -> SearchScope<'static> {
    SearchScope {
        target: "Y1",
        cluster: 0,
    }
}

#[test]
fn test_search_fits_linear_cluster() {
    let (train_x, train_y) = linear_data(60, 1);
    let (test_x, test_y) = linear_data(20, 2);
    let data = ClusterData {
        train_x: &train_x,
        train_y: &train_y,
        test_x: &test_x,
        test_y: &test_y,
    };

    let outcome = find_best_model(&data, &SearchConfig::quick(), scope(), 42).unwrap();

    let families: Vec<RegressorFamily> = outcome.families.iter().map(|f| f.family).collect();
    assert_eq!(families, RegressorFamily::ALL.to_vec());
    assert!(outcome.winner.test_score > 0.95, "winner scored {}", outcome.winner.test_score);
    assert_eq!(outcome.model.family(), outcome.winner.family);
    assert_eq!(outcome.winner.hyperparameters.family(), outcome.winner.family);

    // The winner holds the best test score of all families
    for family in &outcome.families {
        assert!(family.test_score <= outcome.winner.test_score);
    }

    let pred = outcome.model.predict(&test_x).unwrap();
    let score = adjusted_r2_score(&test_y.to_vec(), &pred.to_vec(), test_x.ncols());
    assert!((score - outcome.winner.test_score).abs() < 1e-12);
}

#[test]
fn test_equal_scores_go_to_higher_priority_family() {
    // A constant target is predicted exactly by ridge, so any other family can at
    // best tie with it
    let (train_x, _) = linear_data(30, 3);
    let (test_x, _) = linear_data(10, 4);
    let train_y = Array1::from_elem(30, 5.0);
    let test_y = Array1::from_elem(10, 5.0);
    let data = ClusterData {
        train_x: &train_x,
        train_y: &train_y,
        test_x: &test_x,
        test_y: &test_y,
    };

    let outcome = find_best_model(&data, &SearchConfig::quick(), scope(), 7).unwrap();
    assert_eq!(outcome.winner.family, RegressorFamily::Ridge);
    assert_eq!(outcome.winner.test_score, 1.0);
}

#[test]
fn test_empty_test_split_scores_on_training_rows() {
    let (train_x, train_y) = linear_data(12, 5);
    let test_x = Array2::<f64>::zeros((0, 2));
    let test_y = Array1::<f64>::zeros(0);
    let data = ClusterData {
        train_x: &train_x,
        train_y: &train_y,
        test_x: &test_x,
        test_y: &test_y,
    };

    let outcome = find_best_model(&data, &SearchConfig::quick(), scope(), 1).unwrap();
    assert!(outcome.winner.test_score.is_finite());
}

#[test]
fn test_too_few_rows_is_a_search_failure() {
    let train_x = Array2::from_shape_vec((1, 2), vec![0.5, 1.0]).unwrap();
    let train_y = Array1::from_vec(vec![2.0]);
    let test_x = Array2::<f64>::zeros((0, 2));
    let test_y = Array1::<f64>::zeros(0);
    let data = ClusterData {
        train_x: &train_x,
        train_y: &train_y,
        test_x: &test_x,
        test_y: &test_y,
    };

    let scope = SearchScope {
        target: "Y2",
        cluster: 4,
    };
    match find_best_model(&data, &SearchConfig::quick(), scope, 1) {
        Err(PipelineError::ModelSearchFailure {
            target,
            cluster,
            family,
            ..
        }) => {
            assert_eq!(target, "Y2");
            assert_eq!(cluster, 4);
            assert_eq!(family, RegressorFamily::Ridge);
        }
        other => panic!("expected ModelSearchFailure, got {:?}", other.map(|o| o.winner.family)),
    }
}

#[test]
fn test_search_is_reproducible_for_a_seed() {
    let (train_x, train_y) = linear_data(40, 8);
    let (test_x, test_y) = linear_data(12, 9);
    let data = ClusterData {
        train_x: &train_x,
        train_y: &train_y,
        test_x: &test_x,
        test_y: &test_y,
    };

    let a = find_best_model(&data, &SearchConfig::quick(), scope(), 3).unwrap();
    let b = find_best_model(&data, &SearchConfig::quick(), scope(), 3).unwrap();
    assert_eq!(a.winner.family, b.winner.family);
    assert_eq!(a.winner.hyperparameters, b.winner.hyperparameters);
    assert_eq!(a.winner.test_score, b.winner.test_score);
}

#[test]
fn test_best_index_prefers_earlier_on_ties() {
    assert_eq!(best_index(&[0.5, 0.7, 0.7, 0.1]), Some(1));
    assert_eq!(best_index(&[f64::NAN, 0.2]), Some(1));
    assert_eq!(best_index(&[f64::NAN]), Some(0));
    assert_eq!(best_index(&[]), None);
}

#[test]
fn test_folds_cover_every_row_once() {
    let splits = k_fold(17, 5, 3).unwrap();
    let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..17).collect::<Vec<_>>());
    for split in &splits {
        assert_eq!(split.train_indices.len() + split.test_indices.len(), 17);
    }
}

#[test]
fn test_train_test_split_sizes() {
    let (train, test) = train_test_split(10, 0.25, 0);
    assert_eq!(test.len(), 3);
    assert_eq!(train.len(), 7);

    let (train, test) = train_test_split(1, 0.25, 0);
    assert_eq!(train.len(), 1);
    assert!(test.is_empty());
}

#[test]
fn test_candidate_grids_respect_config() {
    let config = SearchConfig::quick();
    assert_eq!(candidates(RegressorFamily::Ridge, &config, 0).len(), config.n_alphas);
    assert_eq!(candidates(RegressorFamily::Lasso, &config, 0).len(), config.n_alphas * 2);
    assert_eq!(candidates(RegressorFamily::Svr, &config, 0).len(), config.svr_iter);

    for candidate in candidates(RegressorFamily::BoostedTrees, &config, 0) {
        match candidate {
            Hyperparameters::BoostedTrees { n_estimators, .. } => {
                assert!(n_estimators <= config.max_boosting_rounds)
            }
            other => panic!("unexpected candidate {:?}", other),
        }
    }
}
