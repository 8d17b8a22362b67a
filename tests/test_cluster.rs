//! Tests for k-means, the inertia curve and knee-based cluster-count selection

#[path = "common/mod.rs"]
mod common;

use clustreg::config::ClusterConfig;
use clustreg::pipeline::cluster::{elbow_curve, select_clusters, KMeans};
use clustreg::pipeline::knee::find_knee;
use clustreg::pipeline::scaler::StandardScaler;
use clustreg::PipelineError;
use common::*;
use ndarray::Array2;

/// Scaled (x1, x2) of the synthetic table: three tight, well separated groups
fn blob_matrix() -> (Array2<f64>, Vec<String>) {
    let df = create_regression_dataframe(150, 3)
        .select(["x1", "x2"])
        .unwrap();
    let scaler = StandardScaler::fit(&df, "Y1").unwrap();
    (scaler.transform_matrix(&df).unwrap(), scaler.column_names())
}

fn small_config() -> ClusterConfig {
    ClusterConfig {
        n_init: 4,
        ..Default::default()
    }
}

#[test]
fn test_inertia_curve_is_non_increasing() {
    let (x, _) = blob_matrix();
    let fits = elbow_curve(&x, &small_config(), 42).unwrap();

    assert_eq!(fits.len(), 10);
    for (k, pair) in fits.windows(2).enumerate() {
        assert!(
            pair[1].inertia <= pair[0].inertia + 1e-9,
            "inertia rose from k={} to k={}",
            k + 1,
            k + 2
        );
    }
}

#[test]
fn test_curve_is_capped_at_row_count() {
    let x = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 5.0, 6.0]).unwrap();
    let fits = elbow_curve(&x, &small_config(), 0).unwrap();
    assert_eq!(fits.len(), 4);
    assert!(fits[3].inertia.abs() < 1e-12);
}

#[test]
fn test_knee_finds_the_three_groups() {
    let (x, columns) = blob_matrix();
    let selection = select_clusters(&x, &columns, "Y1", &small_config(), 42).unwrap();

    assert_eq!(selection.model.k, 3);
    assert_eq!(selection.model.centroids.nrows(), 3);
    assert_eq!(selection.model.inertia_curve.len(), 10);

    // Rows built from the same center share a label
    for i in 3..x.nrows() {
        assert_eq!(selection.labels[i], selection.labels[i % 3]);
    }
    assert_ne!(selection.labels[0], selection.labels[1]);
    assert_ne!(selection.labels[1], selection.labels[2]);
}

#[test]
fn test_selection_is_deterministic_for_a_seed() {
    let (x, columns) = blob_matrix();
    let a = select_clusters(&x, &columns, "Y1", &small_config(), 5).unwrap();
    let b = select_clusters(&x, &columns, "Y1", &small_config(), 5).unwrap();

    assert_eq!(a.model.k, b.model.k);
    assert_eq!(a.labels, b.labels);
    assert_eq!(a.model.centroids, b.model.centroids);
    assert_eq!(a.model.inertia_curve, b.model.inertia_curve);
}

#[test]
fn test_predict_matches_training_labels() {
    let (x, columns) = blob_matrix();
    let selection = select_clusters(&x, &columns, "Y1", &small_config(), 42).unwrap();
    let routed = selection.model.predict(&x).unwrap();
    assert_eq!(routed, selection.labels);
}

#[test]
fn test_predict_rejects_wrong_width() {
    let (x, columns) = blob_matrix();
    let selection = select_clusters(&x, &columns, "Y1", &small_config(), 42).unwrap();
    let narrow = Array2::<f64>::zeros((2, 1));
    assert!(selection.model.predict(&narrow).is_err());
}

#[test]
fn test_straight_line_has_no_knee() {
    let x: Vec<f64> = (1..=10).map(|k| k as f64).collect();
    let y: Vec<f64> = x.iter().map(|k| 100.0 - 10.0 * k).collect();
    assert_eq!(find_knee(&x, &y, 1.0), None);
}

#[test]
fn test_short_curve_reports_no_knee() {
    // Two points on the curve are too few for a knee
    let values: Vec<f64> = (0..4).map(|i| i as f64).collect();
    let x = Array2::from_shape_vec((4, 1), values).unwrap();
    let config = ClusterConfig {
        max_k: 2,
        ..small_config()
    };
    match select_clusters(&x, &["a".to_string()], "Y2", &config, 1) {
        Err(PipelineError::NoKneeFound { target, inertia }) => {
            assert_eq!(target, "Y2");
            assert_eq!(inertia.len(), 2);
        }
        other => panic!("expected NoKneeFound, got {:?}", other.map(|s| s.model.k)),
    }
}

#[test]
fn test_kmeans_separates_two_groups() {
    let x = Array2::from_shape_vec((6, 1), vec![0.0, 0.1, 0.2, 9.8, 9.9, 10.0]).unwrap();

    let fit = KMeans::new(2).with_random_state(3).fit(&x).unwrap();
    assert_eq!(fit.labels[0], fit.labels[2]);
    assert_eq!(fit.labels[3], fit.labels[5]);
    assert_ne!(fit.labels[0], fit.labels[3]);
}
