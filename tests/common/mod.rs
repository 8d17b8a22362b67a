//! Shared test utilities and fixture generators

#![allow(dead_code)]

use clustreg::config::{ClusterConfig, PipelineConfig, SearchConfig};
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use tempfile::TempDir;

/// Cluster centers in (x1, x2) for the synthetic regression data
pub const CENTERS: [(f64, f64); 3] = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)];

/// Per-group offsets of the two targets
pub const Y1_OFFSETS: [f64; 3] = [0.0, 50.0, 100.0];
pub const Y2_OFFSETS: [f64; 3] = [30.0, -20.0, 10.0];

/// Create a seeded two-target regression table with three well separated groups
///
/// Columns:
/// - `ID`: unique integer ids starting at 1000
/// - `x1`, `x2`: group position plus uniform jitter
/// - `x3`: uniform driver of the within-group target variation
/// - `x1_copy`: near-exact multiple of `x1` (collinear)
/// - `noise`: independent of both targets
/// - `constant`: zero variance
/// - `Y1`, `Y2`: group offset plus a linear term
pub fn create_regression_dataframe(rows: usize, seed: u64) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut ids = Vec::with_capacity(rows);
    let mut x1 = Vec::with_capacity(rows);
    let mut x2 = Vec::with_capacity(rows);
    let mut x3 = Vec::with_capacity(rows);
    let mut x1_copy = Vec::with_capacity(rows);
    let mut noise = Vec::with_capacity(rows);
    let mut y1 = Vec::with_capacity(rows);
    let mut y2 = Vec::with_capacity(rows);

    for i in 0..rows {
        let group = i % CENTERS.len();
        let (cx, cy) = CENTERS[group];
        let a = cx + rng.gen_range(-1.0..1.0);
        let b = cy + rng.gen_range(-1.0..1.0);
        let c: f64 = rng.gen_range(0.0..1.0);

        ids.push(1000 + i as i64);
        x1.push(a);
        x2.push(b);
        x3.push(c);
        x1_copy.push(2.0 * a + rng.gen_range(-0.001..0.001));
        noise.push(rng.gen_range(0.0..1.0));
        y1.push(Y1_OFFSETS[group] + 5.0 * c + 0.5 * a);
        y2.push(Y2_OFFSETS[group] - 4.0 * c);
    }

    df! {
        "ID" => ids,
        "x1" => x1,
        "x2" => x2,
        "x3" => x3,
        "x1_copy" => x1_copy,
        "noise" => noise,
        "constant" => vec![1.0f64; rows],
        "Y1" => y1,
        "Y2" => y2,
    }
    .unwrap()
}

/// Regression table with a sparse column (about 80% missing) and gaps in `x3`
pub fn create_regression_dataframe_with_missing(rows: usize, seed: u64) -> DataFrame {
    let mut df = create_regression_dataframe(rows, seed);

    let x3: Vec<Option<f64>> = df
        .column("x3")
        .unwrap()
        .f64()
        .unwrap()
        .iter()
        .enumerate()
        .map(|(i, v)| if i % 10 == 7 { None } else { v })
        .collect();
    let sparse: Vec<Option<f64>> = (0..rows)
        .map(|i| if i % 5 == 0 { Some(i as f64) } else { None })
        .collect();

    df.with_column(Column::new("x3".into(), x3)).unwrap();
    df.with_column(Column::new("sparse".into(), sparse)).unwrap();
    df
}

/// Create a DataFrame with specific missing value patterns
pub fn create_missing_test_dataframe() -> DataFrame {
    df! {
        "col_complete" => [1.0f64, 2.0, 3.0, 4.0, 5.0],
        "col_20pct_missing" => [Some(1.0f64), None, Some(3.0), Some(4.0), Some(5.0)],
        "col_40pct_missing" => [Some(1.0f64), Some(2.0), None, None, Some(5.0)],
        "col_80pct_missing" => [Some(1.0f64), None, None, None, None],
    }
    .unwrap()
}

/// Pipeline configuration small enough for integration tests
pub fn quick_config() -> PipelineConfig {
    PipelineConfig {
        cluster: ClusterConfig {
            n_init: 3,
            ..Default::default()
        },
        search: SearchConfig::quick(),
        ..Default::default()
    }
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("test_data.parquet");

    let mut file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Assert that a DataFrame has the expected shape
pub fn assert_shape(df: &DataFrame, expected_rows: usize, expected_cols: usize) {
    assert_eq!(df.height(), expected_rows, "Row count mismatch");
    assert_eq!(df.width(), expected_cols, "Column count mismatch");
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual.iter().any(|c| c == col),
            "Expected column '{}' not found. Available: {:?}",
            col,
            actual
        );
    }
}

/// Assert that a DataFrame does NOT contain specific columns
pub fn assert_missing_columns(df: &DataFrame, unexpected_cols: &[&str]) {
    let actual: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in unexpected_cols {
        assert!(
            !actual.iter().any(|c| c == col),
            "Column '{}' should not be present",
            col
        );
    }
}
