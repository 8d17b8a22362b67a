//! Benchmark the drop list detectors: correlation scan and mutual information
//!
//! Run with: cargo bench --bench selection_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polars::prelude::*;
use rand::prelude::*;
use rand::SeedableRng;

use clustreg::config::SelectionConfig;
use clustreg::pipeline::correlation::find_collinear_columns;
use clustreg::pipeline::mutual_info::mutual_info_regression;
use clustreg::pipeline::select_features;

/// Features where every fourth column is a noisy copy of an earlier one,
/// plus a target driven by the first few columns
fn generate_test_data(n_rows: usize, n_features: usize, seed: u64) -> (DataFrame, Vec<f64>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut raw: Vec<Vec<f64>> = Vec::with_capacity(n_features);

    for i in 0..n_features {
        let values: Vec<f64> = if i % 4 == 3 {
            raw[i - 3]
                .iter()
                .map(|v| v + rng.gen::<f64>() * 10.0 - 5.0)
                .collect()
        } else {
            (0..n_rows).map(|_| rng.gen::<f64>() * 100.0).collect()
        };
        raw.push(values);
    }

    let target: Vec<f64> = (0..n_rows)
        .map(|r| {
            raw.iter()
                .take(3)
                .enumerate()
                .map(|(j, col)| (j as f64 + 1.0) * col[r])
                .sum::<f64>()
                + rng.gen::<f64>()
        })
        .collect();

    let columns: Vec<Column> = raw
        .into_iter()
        .enumerate()
        .map(|(i, values)| Column::new(format!("feature_{}", i).into(), values))
        .collect();

    (DataFrame::new(columns).expect("Failed to create DataFrame"), target)
}

fn benchmark_collinearity(c: &mut Criterion) {
    let mut group = c.benchmark_group("collinearity_by_columns");
    group.sample_size(30);

    let n_rows = 10_000;
    for n_cols in [10, 25, 50, 100] {
        let (df, _) = generate_test_data(n_rows, n_cols, 42);
        group.throughput(Throughput::Elements(((n_cols * (n_cols - 1)) / 2) as u64));

        group.bench_with_input(BenchmarkId::new("matrix", n_cols), &df, |b, df| {
            b.iter(|| {
                let _ = find_collinear_columns(black_box(df), black_box(0.8));
            });
        });
    }

    group.finish();
}

fn benchmark_mutual_info(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutual_info_by_rows");
    group.sample_size(10);

    let n_cols = 10;
    for n_rows in [250, 500, 1_000, 2_000] {
        let (df, target) = generate_test_data(n_rows, n_cols, 7);
        let features: Vec<Vec<f64>> = df
            .get_columns()
            .iter()
            .map(|c| c.f64().unwrap().into_no_null_iter().collect())
            .collect();
        group.throughput(Throughput::Elements(n_rows as u64));

        group.bench_with_input(
            BenchmarkId::new("ksg", n_rows),
            &(&features, &target),
            |b, (features, target)| {
                b.iter(|| {
                    let _ = mutual_info_regression(black_box(*features), black_box(*target), 3, 42);
                });
            },
        );
    }

    group.finish();
}

fn benchmark_select_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_features");
    group.sample_size(10);

    let config = SelectionConfig::default();
    for n_cols in [8, 16, 32] {
        let (df, target) = generate_test_data(1_000, n_cols, 3);
        group.bench_with_input(BenchmarkId::new("drop_list", n_cols), &df, |b, df| {
            b.iter(|| {
                let _ = select_features(black_box(df), "Y1", black_box(&target), &config, 42);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_collinearity,
    benchmark_mutual_info,
    benchmark_select_features,
);
criterion_main!(benches);
