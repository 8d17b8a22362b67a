//! Tests for the drop list detectors: zero variance, mutual information and collinearity

#[path = "common/mod.rs"]
mod common;

use clustreg::config::SelectionConfig;
use clustreg::pipeline::correlation::find_collinear_columns;
use clustreg::pipeline::loader::{column_values, split_features_targets};
use clustreg::pipeline::mutual_info::mutual_info_regression;
use clustreg::pipeline::selection::{select_features, DropList, DropReason};
use common::*;
use polars::prelude::*;

fn regression_features() -> (DataFrame, Vec<(String, Vec<f64>)>) {
    let df = create_regression_dataframe(200, 7);
    split_features_targets(&df, "ID", &["Y1".to_string(), "Y2".to_string()]).unwrap()
}

#[test]
fn test_split_excludes_id_and_targets() {
    let (features, targets) = regression_features();
    assert_has_columns(&features, &["x1", "x2", "x3", "x1_copy", "noise", "constant"]);
    assert_missing_columns(&features, &["ID", "Y1", "Y2"]);
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0].0, "Y1");
    assert_eq!(targets[1].1.len(), 200);
}

#[test]
fn test_detectors_populate_drop_list() {
    let (features, targets) = regression_features();
    let (name, y) = &targets[0];
    let outcome = select_features(&features, name, y, &SelectionConfig::default(), 42).unwrap();

    assert!(outcome.drop_list.contains("constant"));
    assert!(outcome.drop_list.contains("noise"));
    assert!(outcome.drop_list.contains("x1_copy"));
    assert!(!outcome.drop_list.contains("x1"));
    assert!(!outcome.drop_list.contains("x2"));

    assert!(outcome
        .entries
        .iter()
        .any(|e| e.column == "constant" && e.reason == DropReason::ZeroVariance));
    assert!(outcome.entries.iter().any(|e| e.column == "x1_copy"
        && matches!(&e.reason, DropReason::Collinear { with, .. } if with == "x1")));
    assert!(outcome
        .entries
        .iter()
        .any(|e| e.column == "noise" && matches!(e.reason, DropReason::LowRelevance { .. })));
}

#[test]
fn test_drop_list_applied_removes_listed_columns() {
    let (features, targets) = regression_features();
    let (name, y) = &targets[1];
    let outcome = select_features(&features, name, y, &SelectionConfig::default(), 42).unwrap();

    let reduced = outcome.drop_list.apply(&features);
    assert_eq!(reduced.width(), features.width() - outcome.drop_list.len());
    for column in outcome.drop_list.iter() {
        assert_missing_columns(&reduced, &[column.as_str()]);
    }

    // Replaying on an already reduced table changes nothing
    let twice = outcome.drop_list.apply(&reduced);
    assert!(twice.equals(&reduced));
}

#[test]
fn test_relevance_is_reproducible_for_a_seed() {
    let (features, targets) = regression_features();
    let (name, y) = &targets[0];
    let config = SelectionConfig::default();

    let a = select_features(&features, name, y, &config, 11).unwrap();
    let b = select_features(&features, name, y, &config, 11).unwrap();
    assert_eq!(a.relevance, b.relevance);
    assert_eq!(a.drop_list, b.drop_list);
}

#[test]
fn test_mutual_info_ranks_dependent_above_independent() {
    let (features, targets) = regression_features();
    let x2 = column_values(features.column("x2").unwrap()).unwrap();
    let noise = column_values(features.column("noise").unwrap()).unwrap();

    let scores = mutual_info_regression(&[x2, noise], &targets[0].1, 3, 0);
    assert!(scores[0] > 0.1, "x2 score {}", scores[0]);
    assert!(scores[1] < 0.1, "noise score {}", scores[1]);
    assert!(scores.iter().all(|&s| s >= 0.0));
}

#[test]
fn test_collinearity_keeps_earlier_column() {
    let df = df! {
        "a" => [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
        "b" => [2.0f64, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0, 18.0, 20.0],
        "c" => [10.0f64, 9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0],
        "d" => [5.0f64, 1.0, 8.0, 2.0, 9.0, 3.0, 7.0, 4.0, 6.0, 0.0],
    }
    .unwrap();
    let pairs = find_collinear_columns(&df, 0.8).unwrap();
    let marked: Vec<&str> = pairs.iter().map(|p| p.feature.as_str()).collect();

    assert_eq!(marked, vec!["b", "c"]);
    assert_eq!(pairs[0].correlated_with, "a");
    assert!(pairs[1].correlation < 0.0);
}

#[test]
fn test_drop_list_serializes_sorted() {
    let list = DropList::new(["z", "a", "m"]);
    let json = serde_json::to_string(&list).unwrap();
    let restored: DropList = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, list);
    assert_eq!(list.iter().next().map(|s| s.as_str()), Some("a"));
}
