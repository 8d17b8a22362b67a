//! Tests for prediction routing: per-row failure scoping and the outer join on row id

#[path = "common/mod.rs"]
mod common;

use std::sync::{Arc, OnceLock};

use clustreg::pipeline::loader::frame_to_matrix;
use clustreg::pipeline::{train_all, Generation, PredictionRouter, RowArchive};
use clustreg::pipeline::artifacts::GenerationManifest;
use common::*;
use polars::prelude::*;

/// One in-memory generation shared by every test in this file
fn generation() -> &'static Generation {
    static GENERATION: OnceLock<Generation> = OnceLock::new();
    GENERATION.get_or_init(|| {
        let config = quick_config();
        let df = create_regression_dataframe(180, 23);
        let trained = train_all(&df, &config).unwrap();
        let targets: Vec<_> = trained.into_iter().map(|t| t.artifacts).collect();
        Generation {
            manifest: GenerationManifest {
                id: "test-generation".to_string(),
                created_at: chrono::Utc::now(),
                crate_version: env!("CARGO_PKG_VERSION").to_string(),
                targets: targets.iter().map(|t| t.target.clone()).collect(),
                config,
            },
            targets,
        }
    })
}

fn serving_rows() -> DataFrame {
    create_regression_dataframe(60, 29)
}

/// Cluster label each serving row gets for `target`
fn routed_clusters(generation: &Generation, target: &str, df: &DataFrame) -> Vec<usize> {
    let artifacts = generation.target(target).unwrap();
    let features = df.drop_many(["ID", "Y1", "Y2"]);
    let filled = artifacts.missing.apply(&features).unwrap();
    let reduced = artifacts.drop_list.apply(&filled);
    let x = artifacts.scaler.transform_matrix(&reduced).unwrap();
    artifacts.cluster_model.predict(&x).unwrap()
}

#[test]
fn test_every_row_gets_every_target() {
    let router = PredictionRouter::new(Arc::new(generation().clone()));
    let df = serving_rows();
    let result = router.predict(&df).unwrap();

    assert_eq!(result.input_rows, 60);
    assert_eq!(result.rows.len(), 60);
    assert!(result.failures.is_empty());
    assert_eq!(result.targets, vec!["Y1", "Y2"]);

    let out = result.to_dataframe().unwrap();
    assert_shape(&out, 60, 3);
    assert_has_columns(&out, &["ID", "Y1", "Y2"]);
    assert_eq!(out.column("Y1").unwrap().null_count(), 0);
}

#[test]
fn test_target_columns_in_serving_table_are_ignored() {
    let router = PredictionRouter::new(Arc::new(generation().clone()));
    let df = serving_rows();
    let without_targets = df.drop_many(["Y1", "Y2"]);

    let with = router.predict(&df).unwrap();
    let without = router.predict(&without_targets).unwrap();
    assert_eq!(with.rows, without.rows);
}

#[test]
fn test_missing_artifact_only_affects_its_rows() {
    let mut broken = generation().clone();
    let df = serving_rows();
    let clusters = routed_clusters(&broken, "Y1", &df);
    let removed = clusters[0];
    let affected = clusters.iter().filter(|&&c| c == removed).count();

    broken
        .targets
        .iter_mut()
        .find(|t| t.target == "Y1")
        .unwrap()
        .models
        .remove(&removed);

    let result = PredictionRouter::new(Arc::new(broken)).predict(&df).unwrap();

    assert_eq!(result.failure_count("Y1"), affected);
    assert_eq!(result.predicted_count("Y1"), 60 - affected);
    assert_eq!(result.predicted_count("Y2"), 60);
    assert_eq!(result.failure_count("Y2"), 0);
    assert!(result
        .failures
        .iter()
        .all(|f| f.target == "Y1" && f.reason.contains("No model registered")));

    // Rows that lost Y1 still carry their Y2 prediction in the joined output
    let first_id = df.column("ID").unwrap().i64().unwrap().get(0).unwrap();
    assert_eq!(result.get(first_id, "Y1"), None);
    assert!(result.get(first_id, "Y2").is_some());
}

#[test]
fn test_missing_feature_column_fails_the_target_rows() {
    let router = PredictionRouter::new(Arc::new(generation().clone()));
    let df = serving_rows().drop("x2").unwrap();

    let result = router.predict(&df).unwrap();
    assert!(result.rows.is_empty());
    assert_eq!(result.failure_count("Y1"), 60);
    assert_eq!(result.failure_count("Y2"), 60);
    assert!(result.failures.iter().all(|f| f.reason.contains("x2")));
}

#[test]
fn test_serving_nulls_are_imputed() {
    let router = PredictionRouter::new(Arc::new(generation().clone()));
    let mut df = serving_rows();
    let x1: Vec<Option<f64>> = df
        .column("x1")
        .unwrap()
        .f64()
        .unwrap()
        .iter()
        .enumerate()
        .map(|(i, v)| if i == 4 { None } else { v })
        .collect();
    df.with_column(Column::new("x1".into(), x1)).unwrap();

    let result = router.predict(&df).unwrap();
    assert!(result.failures.is_empty());
    let id = df.column("ID").unwrap().i64().unwrap().get(4).unwrap();
    assert!(result.get(id, "Y1").is_some());
}

#[test]
fn test_duplicate_ids_are_rejected() {
    let router = PredictionRouter::new(Arc::new(generation().clone()));
    let df = df! {
        "ID" => [1i64, 1],
        "x1" => [0.0f64, 0.0],
        "x2" => [0.0f64, 0.0],
        "x3" => [0.5f64, 0.5],
        "x1_copy" => [0.0f64, 0.0],
        "noise" => [0.5f64, 0.5],
        "constant" => [1.0f64, 1.0],
    }
    .unwrap();
    assert!(router.predict(&df).is_err());
}

#[test]
fn test_values_are_rounded_to_two_decimals() {
    let router = PredictionRouter::new(Arc::new(generation().clone()));
    let result = router.predict(&serving_rows()).unwrap();
    for values in result.rows.values() {
        for value in values.iter().flatten() {
            assert!(((value * 100.0).round() - value * 100.0).abs() < 1e-6);
        }
    }
}

#[test]
fn test_predictions_written_as_csv() {
    let router = PredictionRouter::new(Arc::new(generation().clone()));
    let result = router.predict(&serving_rows()).unwrap();

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("predictions.csv");
    result.write(&path).unwrap();

    let written = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path))
        .unwrap()
        .finish()
        .unwrap();
    assert_shape(&written, 60, 3);
    let ids = frame_to_matrix(&written, &["ID".to_string()]).unwrap();
    assert_eq!(ids[[0, 0]], 1000.0);
}

#[test]
fn test_archive_receives_validated_rows() {
    let dir = tempfile::TempDir::new().unwrap();
    let archive = RowArchive::spawn(dir.path().join("archive")).unwrap();
    archive.submit("serving batch", &serving_rows());

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    loop {
        let written: Vec<_> = std::fs::read_dir(archive.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("serving_batch_") && name.ends_with(".csv"))
            .collect();
        if !written.is_empty() {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "archive file never appeared");
        std::thread::sleep(std::time::Duration::from_millis(20));
    }
}
